//! # callvisor
//!
//! **Callvisor** runs outbound-call campaigns: it walks a list of contacts,
//! opens a live status connection per contact, asks an external service to
//! place each call, and keeps the latest call status per contact while
//! broadcasting every transition to subscribers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!         worklist: Vec<CallTarget>
//!                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  DispatchEngine (one session at a time, cancellable)              │
//! │   for each target:                                                │
//! │     registry.connect ─► store ← Pending ─► initiator.initiate     │
//! │     ─► store ← Initiated | Failed (+ disconnect) ─► pause         │
//! └──────┬───────────────────────────┬───────────────────────┬────────┘
//!        ▼                           ▼                       │
//! ┌──────────────────────┐   ┌────────────────────┐          │
//! │ ConnectionRegistry   │   │ InitiationAdapter  │          │
//! │ handles + timers     │   │ (HttpInitiator)    │          │
//! └──────┬───────────────┘   └────────────────────┘          │
//!        ▼                                                   │
//!   ConnectionActor ×N ── ConnectionEvent ──► registry listener
//!   (ws://host/ws/<phone>)                      │   ├─► CallStatusStore
//!                                               │   └─► reconnect timers
//!                                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                  Bus (broadcast channel of Event)                 │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                           SubscriberSet (per-subscriber queues)
//!                          ┌─────────┼─────────┐
//!                          ▼         ▼         ▼
//!                      LogWriter  custom    custom
//! ```
//!
//! ### Connection lifecycle
//! ```text
//! connect(target) ──► actor opens ──► Opened
//!   ├─ push frame       ─► store.upsert + StatusPushed
//!   ├─ close 1000/1001/4000 ─► no retry
//!   ├─ any other close  ─► timer(3s) ─► reopen
//!   └─ disconnect()     ─► close 1000, timer cancelled, late events ignored
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types                                   |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Campaign**      | Wiring, lifecycle, signal-driven shutdown                | [`Campaign`], [`CampaignBuilder`]           |
//! | **Dispatch**      | Sequential, cancellable initiation loop                  | [`DispatchEngine`], [`DispatchReport`]      |
//! | **Connections**   | One status connection per target with reconnects         | [`ConnectionRegistry`], [`Connector`]       |
//! | **Status store**  | Latest status per target with stale-update protection    | [`CallStatusStore`], [`StatusRecord`]       |
//! | **Collaborators** | Call initiation, contact listing, SSE status channel     | [`InitiationAdapter`], [`ContactDirectory`], [`PushStream`] |
//! | **Policies**      | Close-code classification, reconnect delay and limits    | [`ReconnectPolicy`], [`Backoff`]            |
//! | **Events**        | Typed transitions for logging and dashboards             | [`Event`], [`EventKind`], [`Subscribe`]     |
//! | **Errors**        | Usage, initiation, connection and HTTP client errors     | [`DispatchError`], [`InitiationError`]      |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use callvisor::{Campaign, CallTarget, Config, LogWriter, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         ws_base: "ws://dialer.local:8000".into(),
//!         api_base: "http://dialer.local:8000".into(),
//!         ..Config::default()
//!     };
//!     let campaign = Campaign::builder(cfg)
//!         .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
//!         .build();
//!
//!     let report = campaign
//!         .dispatch(vec![CallTarget::new("1", "+15550001", "Ada")])
//!         .await?;
//!     println!("attempted={} initiated={}", report.attempted, report.initiated);
//!
//!     campaign.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod adapters;
mod campaign;
mod config;
pub mod connection;
mod dispatch;
mod error;
mod events;
mod model;
pub mod policies;
mod store;
mod subscribers;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use adapters::{
    ContactDirectory, ContactPage, HttpInitiator, InitiationAdapter, InitiationOutcome, PushStream,
    PushStreamEnd,
};
pub use campaign::{Campaign, CampaignBuilder, wait_for_shutdown_signal};
pub use config::Config;
pub use connection::{Connection, ConnectionRegistry, Connector, Inbound, WsConnector};
pub use dispatch::{DispatchEngine, DispatchReport, DispatchSession, SessionState};
pub use error::{ClientError, ConnectError, DispatchError, InitiationError};
pub use events::{Bus, Event, EventKind};
pub use model::{CallTarget, PushMessage, StatusKind, StatusRecord, TargetId};
pub use policies::{Backoff, CloseCode, Jitter, ReconnectPolicy, RetryLimit};
pub use store::CallStatusStore;
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
