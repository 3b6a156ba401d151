//! # Events published by the registry, dispatch engine and push stream.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Connection events**: per-target status channel lifecycle
//! - **Status events**: state changes recorded in the store
//! - **Dispatch events**: session and per-target initiation results
//! - **Runtime events**: subscriber health and shutdown
//!
//! The [`Event`] struct carries the metadata needed to explain *why* a
//! transition happened (reason, close code, delay, attempt).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore publication order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use callvisor::{Event, EventKind, StatusKind, TargetId};
//!
//! let ev = Event::new(EventKind::InitiationFailed)
//!     .with_target(TargetId::from("42"))
//!     .with_status(StatusKind::Failed)
//!     .with_reason("number unreachable");
//!
//! assert_eq!(ev.kind, EventKind::InitiationFailed);
//! assert_eq!(ev.target.as_ref().map(|t| t.as_str()), Some("42"));
//! assert_eq!(ev.reason.as_deref(), Some("number unreachable"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::dispatch::SessionState;
use crate::model::{StatusKind, StatusRecord, TargetId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `subscriber`, `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `subscriber`, `reason` (`full` / `closed`).
    SubscriberOverflow,

    /// Shutdown requested (OS signal or explicit call).
    ShutdownRequested,

    // === Connection events ===
    /// Status connection for a target is open.
    ///
    /// Sets: `target`, `attempt` (reconnects that led here, `0` on a first open).
    ConnectionOpened,

    /// Status connection closed without being asked to.
    ///
    /// Sets: `target`, `code` (close code), `reason`.
    ConnectionClosed,

    /// Open failure, mid-stream failure or undecodable frame. Non-fatal to callers.
    ///
    /// Sets: `target`, `reason`.
    ConnectionError,

    /// Status connection closed on request.
    ///
    /// Sets: `target`.
    Disconnected,

    /// Reconnect timer armed.
    ///
    /// Sets: `target`, `code`, `delay_ms`, `attempt`.
    ReconnectScheduled,

    /// Reconnect policy refused to retry (normal close or attempt limit).
    ///
    /// Sets: `target` (absent for the push stream), `code`, `attempt`, `reason`.
    ReconnectExhausted,

    // === Status events ===
    /// A pushed status was applied to the store.
    ///
    /// Sets: `target`, `status`, `call_id`, `reason` (only for unknown statuses).
    StatusPushed,

    /// A pushed status was older than the stored record and was dropped.
    ///
    /// Sets: `target`, `status` (the dropped one), `call_id`, `reason` (stored status).
    StatusRejected,

    /// The push stream reported the end of a batch.
    ///
    /// Sets: `reason` (raw payload).
    BatchCompleted,

    // === Dispatch events ===
    /// A dispatch session started.
    ///
    /// Sets: `attempt` (worklist length).
    DispatchStarted,

    /// Dispatch reached a target and recorded it as pending.
    ///
    /// Sets: `target`, `status` (`pending`).
    DispatchAttempt,

    /// The initiation service accepted the call for a target.
    ///
    /// Sets: `target`, `status` (as stored: `initiated`, or a newer pushed
    /// status), `call_id`, `reason` (service message, if any).
    InitiationSucceeded,

    /// Initiation failed for a target; the session continues.
    ///
    /// Sets: `target`, `status` (as stored, normally `failed`), `reason`.
    InitiationFailed,

    /// A dispatch session reached `Completed` or `Cancelled`.
    ///
    /// Sets: `session`, `attempt` (number of targets attempted).
    DispatchFinished,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Target the event refers to.
    pub target: Option<TargetId>,
    /// Status recorded by this transition.
    pub status: Option<StatusKind>,
    /// External call id.
    pub call_id: Option<Arc<str>>,
    /// Human-readable reason (errors, remote messages, overflow details).
    pub reason: Option<Arc<str>>,
    /// Connection close code.
    pub code: Option<u16>,
    /// Attempt count (starting from 1) or a count, see [`EventKind`].
    pub attempt: Option<u32>,
    /// Reconnect delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Final session state for `DispatchFinished`.
    pub session: Option<SessionState>,
    /// Subscriber name for subscriber health events.
    pub subscriber: Option<&'static str>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            target: None,
            status: None,
            call_id: None,
            reason: None,
            code: None,
            attempt: None,
            delay_ms: None,
            session: None,
            subscriber: None,
        }
    }

    /// Builds a status event from a store record.
    pub fn from_record(kind: EventKind, record: &StatusRecord) -> Self {
        let mut ev = Event::new(kind)
            .with_target(record.target_id.clone())
            .with_status(record.status);
        if let Some(id) = &record.external_call_id {
            ev = ev.with_call_id(id.as_str());
        }
        if let Some(detail) = &record.detail {
            ev = ev.with_reason(detail.as_str());
        }
        ev
    }

    /// Builds a [`EventKind::StatusRejected`] event for `dropped`, which lost to `kept`.
    pub fn status_rejected(dropped: &StatusRecord, kept: &StatusRecord) -> Self {
        let mut ev = Event::new(EventKind::StatusRejected)
            .with_target(dropped.target_id.clone())
            .with_status(dropped.status)
            .with_reason(format!("stored status {} is newer", kept.status));
        if let Some(id) = &dropped.external_call_id {
            ev = ev.with_call_id(id.as_str());
        }
        ev
    }

    /// Attaches a target.
    #[inline]
    pub fn with_target(mut self, target: TargetId) -> Self {
        self.target = Some(target);
        self
    }

    /// Attaches a status.
    #[inline]
    pub fn with_status(mut self, status: StatusKind) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches an external call id.
    #[inline]
    pub fn with_call_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.call_id = Some(id.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a close code.
    #[inline]
    pub fn with_code(mut self, code: u16) -> Self {
        self.code = Some(code);
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a final session state.
    #[inline]
    pub fn with_session(mut self, state: SessionState) -> Self {
        self.session = Some(state);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        let mut ev = Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"));
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        let mut ev = Event::new(EventKind::SubscriberPanicked).with_reason(info);
        ev.subscriber = Some(subscriber);
        ev
    }

    /// Returns true if this is a subscriber overflow event.
    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    /// Returns the target id as a string slice, if set.
    #[inline]
    pub fn target_str(&self) -> Option<&str> {
        self.target.as_ref().map(TargetId::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic() {
        let a = Event::new(EventKind::StatusPushed);
        let b = Event::new(EventKind::StatusPushed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn record_fields_are_carried_over() {
        let rec = StatusRecord::new(TargetId::from("9"), StatusKind::Failed)
            .with_call_id("CA1")
            .with_detail("busy signal");
        let ev = Event::from_record(EventKind::InitiationFailed, &rec);
        assert_eq!(ev.target_str(), Some("9"));
        assert_eq!(ev.status, Some(StatusKind::Failed));
        assert_eq!(ev.call_id.as_deref(), Some("CA1"));
        assert_eq!(ev.reason.as_deref(), Some("busy signal"));
    }

    #[test]
    fn delay_saturates_at_u32() {
        let ev = Event::new(EventKind::ReconnectScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }
}
