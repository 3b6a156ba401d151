//! Dispatch session state.

use std::fmt;

use tokio_util::sync::CancellationToken;

use crate::model::CallTarget;

/// Lifecycle of a dispatch session.
///
/// ```text
/// Idle ──run()──► Running ──worklist done──► Completed
///                    └────token cancelled──► Cancelled
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session has run yet.
    #[default]
    Idle,
    /// A session is iterating its worklist.
    Running,
    /// Every target was attempted.
    Completed,
    /// Cancellation was observed before the worklist was exhausted.
    Cancelled,
}

impl SessionState {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        }
    }

    /// True for `Completed` and `Cancelled`.
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pass over a worklist.
///
/// The cursor only moves forward.
#[derive(Debug)]
pub struct DispatchSession {
    worklist: Vec<CallTarget>,
    cursor: usize,
    cancel: CancellationToken,
}

impl DispatchSession {
    pub(crate) fn new(worklist: Vec<CallTarget>, cancel: CancellationToken) -> Self {
        Self {
            worklist,
            cursor: 0,
            cancel,
        }
    }

    /// Target under the cursor, if any remain.
    pub fn current(&self) -> Option<&CallTarget> {
        self.worklist.get(self.cursor)
    }

    /// Moves past the current target.
    pub(crate) fn advance(&mut self) {
        self.cursor = (self.cursor + 1).min(self.worklist.len());
    }

    /// Index of the next target to attempt.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of targets in the worklist.
    pub fn len(&self) -> usize {
        self.worklist.len()
    }

    /// True if the worklist is empty.
    pub fn is_empty(&self) -> bool {
        self.worklist.is_empty()
    }

    /// True once every target has been attempted.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.worklist.len()
    }

    /// True if the session was asked to stop.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Outcome of [`DispatchEngine::run`](super::DispatchEngine::run).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatchReport {
    /// Final state (`Completed` or `Cancelled`).
    pub state: SessionState,
    /// Targets for which initiation was attempted.
    pub attempted: usize,
    /// Targets recorded as `Initiated`.
    pub initiated: usize,
    /// Targets recorded as `Failed`.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_never_passes_the_end() {
        let mut s = DispatchSession::new(
            vec![CallTarget::new("1", "+1", ""), CallTarget::new("2", "+2", "")],
            CancellationToken::new(),
        );
        assert_eq!(s.current().map(|t| t.id.as_str()), Some("1"));
        s.advance();
        s.advance();
        s.advance();
        assert_eq!(s.cursor(), 2);
        assert!(s.is_exhausted());
        assert!(s.current().is_none());
    }

    #[test]
    fn finished_states() {
        assert!(SessionState::Completed.is_finished());
        assert!(SessionState::Cancelled.is_finished());
        assert!(!SessionState::Running.is_finished());
        assert_eq!(SessionState::Cancelled.to_string(), "cancelled");
    }
}
