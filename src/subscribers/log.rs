//! # Tracing subscriber for campaign events.
//!
//! [`LogWriter`] turns every bus event into one `tracing` event under the
//! `callvisor` target. It never installs a global subscriber; the application
//! decides where the output goes.
//!
//! ## Output (with a `fmt` subscriber)
//! ```text
//! INFO callvisor: connection open target_id=1 attempt=0
//! INFO callvisor: status pushed target_id=1 status=ringing call_id=CA123
//! WARN callvisor: initiation failed target_id=2 reason="busy line"
//! INFO callvisor: reconnect scheduled target_id=3 code=1006 delay_ms=3000 attempt=1
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs every event through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let target_id = e.target_str().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SubscriberPanicked => {
                warn!(target: "callvisor", subscriber = ?e.subscriber, reason, "subscriber panicked");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: "callvisor", subscriber = ?e.subscriber, reason, "subscriber overflow");
            }
            EventKind::ShutdownRequested => {
                info!(target: "callvisor", "shutdown requested");
            }
            EventKind::ConnectionOpened => {
                info!(target: "callvisor", target_id, attempt = ?e.attempt, "connection open");
            }
            EventKind::ConnectionClosed => {
                info!(target: "callvisor", target_id, code = ?e.code, "connection closed");
            }
            EventKind::ConnectionError => {
                warn!(target: "callvisor", target_id, reason, "connection error");
            }
            EventKind::Disconnected => {
                debug!(target: "callvisor", target_id, "disconnected");
            }
            EventKind::ReconnectScheduled => {
                info!(
                    target: "callvisor",
                    target_id,
                    code = ?e.code,
                    delay_ms = ?e.delay_ms,
                    attempt = ?e.attempt,
                    "reconnect scheduled"
                );
            }
            EventKind::ReconnectExhausted => {
                warn!(target: "callvisor", target_id, code = ?e.code, attempt = ?e.attempt, reason, "reconnect given up");
            }
            EventKind::StatusPushed => {
                info!(
                    target: "callvisor",
                    target_id,
                    status = ?e.status.map(|s| s.as_str()),
                    call_id = ?e.call_id.as_deref(),
                    "status pushed"
                );
            }
            EventKind::StatusRejected => {
                warn!(
                    target: "callvisor",
                    target_id,
                    status = ?e.status.map(|s| s.as_str()),
                    reason,
                    "stale status dropped"
                );
            }
            EventKind::BatchCompleted => {
                info!(target: "callvisor", reason, "batch completed");
            }
            EventKind::DispatchStarted => {
                info!(target: "callvisor", targets = ?e.attempt, "dispatch started");
            }
            EventKind::DispatchAttempt => {
                debug!(target: "callvisor", target_id, "dispatching");
            }
            EventKind::InitiationSucceeded => {
                info!(target: "callvisor", target_id, call_id = ?e.call_id.as_deref(), "call initiated");
            }
            EventKind::InitiationFailed => {
                warn!(target: "callvisor", target_id, reason, "initiation failed");
            }
            EventKind::DispatchFinished => {
                info!(target: "callvisor", session = ?e.session, attempted = ?e.attempt, "dispatch finished");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}
