//! Error types used by the campaign runtime and its collaborators.
//!
//! - [`DispatchError`] usage errors raised at the call site (fail fast).
//! - [`InitiationError`] transport failures of the call-initiation service.
//! - [`ConnectError`] failures of a per-target status connection. These never
//!   reach the caller of `connect`; the registry turns them into events.
//! - [`ClientError`] failures of the read-only HTTP collaborators
//!   (contact listing, push stream).
//!
//! Every enum provides `as_label` (stable snake_case label for logs) and
//! `as_message` (human-readable detail), the same pair the events carry.

use std::time::Duration;
use thiserror::Error;

/// # Usage errors of the dispatch runtime.
///
/// Raised synchronously when the caller misuses the API. These are never
/// recorded in the status store.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// A dispatch session is already running on this engine.
    #[error("a dispatch session is already running")]
    AlreadyRunning,

    /// The submitted worklist has no targets.
    #[error("worklist is empty")]
    EmptyWorklist,

    /// A target failed validation.
    #[error("invalid target {id:?}: {reason}")]
    InvalidTarget {
        /// Offending target id (may be empty).
        id: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use callvisor::DispatchError;
    ///
    /// assert_eq!(DispatchError::AlreadyRunning.as_label(), "dispatch_already_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::AlreadyRunning => "dispatch_already_running",
            DispatchError::EmptyWorklist => "dispatch_empty_worklist",
            DispatchError::InvalidTarget { .. } => "dispatch_invalid_target",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::AlreadyRunning => "session already running".to_string(),
            DispatchError::EmptyWorklist => "nothing to dispatch".to_string(),
            DispatchError::InvalidTarget { id, reason } => format!("target={id:?}: {reason}"),
        }
    }
}

/// # Transport failures of the call-initiation service.
///
/// The dispatch engine treats any of these exactly like a structured
/// `success: false` response: the target is recorded as failed and the
/// session moves on.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InitiationError {
    /// Request could not be sent or the response could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with a non-2xx status.
    #[error("unexpected status {code}: {body}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Response body (possibly truncated by the server).
        body: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("undecodable response: {0}")]
    Decode(String),

    /// The configured initiation timeout elapsed.
    #[error("no response within {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },
}

impl InitiationError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            InitiationError::Transport(_) => "initiation_transport",
            InitiationError::Status { .. } => "initiation_status",
            InitiationError::Decode(_) => "initiation_decode",
            InitiationError::Timeout { .. } => "initiation_timeout",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            InitiationError::Transport(e) => format!("unreachable: {e}"),
            InitiationError::Status { code, body } => format!("http {code}: {body}"),
            InitiationError::Decode(e) => format!("bad response: {e}"),
            InitiationError::Timeout { timeout } => format!("timeout: {timeout:?}"),
        }
    }
}

impl From<reqwest::Error> for InitiationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            InitiationError::Decode(e.to_string())
        } else {
            InitiationError::Transport(e.to_string())
        }
    }
}

/// # Failures of a per-target status connection.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ConnectError {
    /// The connection could not be opened.
    #[error("open failed: {0}")]
    Open(String),

    /// The connection broke while streaming.
    #[error("stream error: {0}")]
    Stream(String),

    /// A push frame could not be decoded.
    #[error("undecodable push: {0}")]
    Decode(String),
}

impl ConnectError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectError::Open(_) => "connection_open",
            ConnectError::Stream(_) => "connection_stream",
            ConnectError::Decode(_) => "connection_decode",
        }
    }

    /// Indicates whether the error tears the connection down.
    ///
    /// Decode errors only skip the offending frame.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ConnectError::Decode(_))
    }
}

/// # Failures of the read-only HTTP collaborators.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// Request could not be sent or the body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// A payload could not be decoded.
    #[error("undecodable payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Http(_) => "client_http",
            ClientError::Status(_) => "client_status",
            ClientError::Decode(_) => "client_decode",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(DispatchError::EmptyWorklist.as_label(), "dispatch_empty_worklist");
        assert_eq!(
            InitiationError::Timeout {
                timeout: Duration::from_secs(2)
            }
            .as_label(),
            "initiation_timeout"
        );
        assert_eq!(ConnectError::Open("refused".into()).as_label(), "connection_open");
    }

    #[test]
    fn decode_errors_are_not_fatal() {
        assert!(!ConnectError::Decode("x".into()).is_fatal());
        assert!(ConnectError::Stream("reset".into()).is_fatal());
    }

    #[test]
    fn invalid_target_message_names_the_target() {
        let err = DispatchError::InvalidTarget {
            id: "7".into(),
            reason: "empty phone number".into(),
        };
        assert_eq!(err.as_message(), "target=\"7\": empty phone number");
    }
}
