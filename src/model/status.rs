//! # Call lifecycle states and status records.
//!
//! [`StatusKind`] enumerates the wire statuses (case-sensitive snake_case).
//! Anything the runtime does not recognise decodes to [`StatusKind::Unknown`],
//! which is treated like `failed`.
//!
//! ## Terminal states
//! ```text
//! pending ─► initiated ─► ringing ─► in_progress / answered ─► completed
//!                   └──────────┴──────────────┴──► failed | no_answer | busy | canceled
//! ```
//! `completed`, `failed`, `no_answer`, `canceled`, `busy` (and `Unknown`) are terminal.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::Deserialize;

use super::TargetId;

/// Lifecycle state of one target's call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusKind {
    /// Dispatch reached the target; initiation not yet answered.
    Pending,
    /// The initiation service accepted the call.
    Initiated,
    /// The callee's phone is ringing.
    Ringing,
    /// The call is connected and running.
    InProgress,
    /// The callee picked up.
    Answered,
    /// The call ended normally.
    Completed,
    /// Initiation or the call itself failed.
    Failed,
    /// The callee did not pick up.
    NoAnswer,
    /// The call was cancelled before connecting.
    Canceled,
    /// The callee's line was busy.
    Busy,
    /// A status value the runtime does not recognise.
    Unknown,
}

impl StatusKind {
    /// Decodes a wire status. Case-sensitive; unknown values map to [`StatusKind::Unknown`].
    ///
    /// # Example
    /// ```
    /// use callvisor::StatusKind;
    ///
    /// assert_eq!(StatusKind::from_wire("no_answer"), StatusKind::NoAnswer);
    /// assert_eq!(StatusKind::from_wire("Ringing"), StatusKind::Unknown);
    /// ```
    pub fn from_wire(s: &str) -> Self {
        match s {
            "pending" => StatusKind::Pending,
            "initiated" => StatusKind::Initiated,
            "ringing" => StatusKind::Ringing,
            "in_progress" => StatusKind::InProgress,
            "answered" => StatusKind::Answered,
            "completed" => StatusKind::Completed,
            "failed" => StatusKind::Failed,
            "no_answer" => StatusKind::NoAnswer,
            "canceled" => StatusKind::Canceled,
            "busy" => StatusKind::Busy,
            _ => StatusKind::Unknown,
        }
    }

    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Pending => "pending",
            StatusKind::Initiated => "initiated",
            StatusKind::Ringing => "ringing",
            StatusKind::InProgress => "in_progress",
            StatusKind::Answered => "answered",
            StatusKind::Completed => "completed",
            StatusKind::Failed => "failed",
            StatusKind::NoAnswer => "no_answer",
            StatusKind::Canceled => "canceled",
            StatusKind::Busy => "busy",
            StatusKind::Unknown => "unknown",
        }
    }

    /// True if no further transition is expected.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StatusKind::Completed
                | StatusKind::Failed
                | StatusKind::NoAnswer
                | StatusKind::Canceled
                | StatusKind::Busy
                | StatusKind::Unknown
        )
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observation order of status records, independent of the wall clock.
static RECORD_SEQ: AtomicU64 = AtomicU64::new(1);

/// Latest observed state of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// Target this record belongs to.
    pub target_id: TargetId,
    /// Call id assigned by the initiation service, once known.
    pub external_call_id: Option<String>,
    /// Lifecycle state.
    pub status: StatusKind,
    /// When the state was observed (wall clock, for display only).
    pub observed_at: SystemTime,
    /// Monotonic observation stamp; the store orders records by it.
    pub seq: u64,
    /// Why the state was reached (failure message, timeout, transport error).
    pub detail: Option<String>,
}

impl StatusRecord {
    /// Creates a record observed now.
    pub fn new(target_id: TargetId, status: StatusKind) -> Self {
        Self {
            target_id,
            external_call_id: None,
            status,
            observed_at: SystemTime::now(),
            seq: RECORD_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            detail: None,
        }
    }

    /// Attaches the external call id.
    #[inline]
    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        self.external_call_id = Some(id.into());
        self
    }

    /// Attaches a human-readable detail.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Overrides the observation timestamp.
    #[inline]
    pub fn observed_at(mut self, at: SystemTime) -> Self {
        self.observed_at = at;
        self
    }

    /// Takes the observation stamp (and time) of `earlier`.
    ///
    /// Used for a result that belongs to the moment a request was sent, so
    /// anything observed while the request was in flight stays newer.
    #[inline]
    pub fn observed_with(mut self, earlier: &StatusRecord) -> Self {
        self.observed_at = earlier.observed_at;
        self.seq = earlier.seq;
        self
    }
}

/// JSON frame pushed over a status connection: `{ "sid", "status", "number" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushMessage {
    /// External call id.
    pub sid: String,
    /// Wire status, see [`StatusKind::from_wire`].
    pub status: String,
    /// Number the update refers to.
    pub number: String,
}

impl PushMessage {
    /// Decodes a frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Decoded status.
    pub fn kind(&self) -> StatusKind {
        StatusKind::from_wire(&self.status)
    }

    /// Converts the frame into a record for `target_id`, observed now.
    pub fn into_record(self, target_id: TargetId) -> StatusRecord {
        let kind = self.kind();
        let mut record = StatusRecord::new(target_id, kind);
        if !self.sid.is_empty() {
            record.external_call_id = Some(self.sid);
        }
        if kind == StatusKind::Unknown {
            record.detail = Some(format!("unrecognised status {:?}", self.status));
        }
        record
    }
}
