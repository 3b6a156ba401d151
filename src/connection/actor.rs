//! # ConnectionActor: drives one status connection.
//!
//! Opens the connection through the [`Connector`], then forwards every inbound
//! item to the registry as a typed [`ConnectionEvent`]. It never decides about
//! reconnects; that is the registry's job.
//!
//! ## Event flow
//! ```text
//! open() ── Err ──► Error(Open) ─► Closed(1006) ─► exit
//!   │
//!   Ok ──► Opened
//!   ▼
//! loop {
//!   token cancelled ─► close(1000) ─► exit          (disconnect / shutdown)
//!   Text(json)      ─► Pushed(msg) | Error(Decode)   (connection stays up)
//!   Closed(code)    ─► Closed(code) ─► exit
//!   Failed(err)     ─► Error(err) ─► Closed(1006) ─► exit
//! }
//! ```
//!
//! ## Rules
//! - Cancellation is checked **before** every read (biased select), so a
//!   cancelled actor never reports a close of its own.
//! - Every event carries the actor's **generation**; the registry drops
//!   lifecycle events from generations it no longer tracks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{Connector, Inbound};
use crate::error::ConnectError;
use crate::model::{CallTarget, PushMessage, TargetId};
use crate::policies::CloseCode;

/// What happened on a connection.
#[derive(Debug)]
pub enum ConnectionEventKind {
    /// The connection is open.
    Opened,
    /// A push message arrived.
    Pushed(PushMessage),
    /// Something went wrong; see [`ConnectError::is_fatal`].
    Error(ConnectError),
    /// The connection ended without being asked to.
    Closed(CloseCode),
}

/// Typed event emitted by a connection actor.
#[derive(Debug)]
pub struct ConnectionEvent {
    /// Target the connection belongs to.
    pub target: TargetId,
    /// Generation of the connection that produced the event.
    pub generation: u64,
    /// What happened.
    pub kind: ConnectionEventKind,
}

/// Drives a single status connection.
pub struct ConnectionActor {
    target: CallTarget,
    generation: u64,
    connector: Arc<dyn Connector>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionActor {
    /// Creates an actor; nothing happens until [`run`](Self::run).
    pub fn new(
        target: CallTarget,
        generation: u64,
        connector: Arc<dyn Connector>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            target,
            generation,
            connector,
            events,
        }
    }

    /// Runs until the connection ends or `token` is cancelled.
    pub async fn run(self, token: CancellationToken) {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            res = self.connector.open(&self.target) => res,
        };

        let mut conn = match opened {
            Ok(conn) => conn,
            Err(e) => {
                self.emit(ConnectionEventKind::Error(e));
                self.emit(ConnectionEventKind::Closed(CloseCode::ABNORMAL));
                return;
            }
        };
        self.emit(ConnectionEventKind::Opened);

        loop {
            let inbound = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    conn.close(CloseCode::NORMAL).await;
                    debug!(target_id = %self.target.id, generation = self.generation, "status connection closed on request");
                    return;
                }
                inbound = conn.next() => inbound,
            };

            match inbound {
                Inbound::Text(raw) => match PushMessage::parse(&raw) {
                    Ok(msg) => self.emit(ConnectionEventKind::Pushed(msg)),
                    Err(e) => self.emit(ConnectionEventKind::Error(ConnectError::Decode(format!(
                        "{e}: {raw}"
                    )))),
                },
                Inbound::Closed(code) => {
                    self.emit(ConnectionEventKind::Closed(code));
                    return;
                }
                Inbound::Failed(e) if !e.is_fatal() => {
                    self.emit(ConnectionEventKind::Error(e));
                }
                Inbound::Failed(e) => {
                    self.emit(ConnectionEventKind::Error(e));
                    self.emit(ConnectionEventKind::Closed(CloseCode::ABNORMAL));
                    return;
                }
            }
        }
    }

    fn emit(&self, kind: ConnectionEventKind) {
        let _ = self.events.send(ConnectionEvent {
            target: self.target.id.clone(),
            generation: self.generation,
            kind,
        });
    }
}
