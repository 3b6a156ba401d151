//! # Connection close codes.
//!
//! [`CloseCode`] is the reason a status connection ended. Websocket close
//! frames carry it directly; the runtime synthesises [`CloseCode::ABNORMAL`]
//! when a connection fails to open or its stream ends without a close frame.

use std::fmt;

/// Reason a status connection closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CloseCode(pub u16);

impl CloseCode {
    /// Normal, intentional close (RFC 6455 1000). Used by `disconnect`.
    pub const NORMAL: CloseCode = CloseCode(1000);
    /// Peer is going away, e.g. server shutdown or page unload (1001).
    pub const GOING_AWAY: CloseCode = CloseCode(1001);
    /// Closed without a close frame, or never opened (1006).
    pub const ABNORMAL: CloseCode = CloseCode(1006);
    /// Server-side internal error (1011).
    pub const SERVER_ERROR: CloseCode = CloseCode(1011);
    /// Application-defined "do not retry" code.
    pub const DO_NOT_RETRY: CloseCode = CloseCode(4000);

    /// True for closes that must not trigger a reconnect.
    pub fn is_intentional(self) -> bool {
        matches!(self, Self::NORMAL | Self::GOING_AWAY | Self::DO_NOT_RETRY)
    }

    /// Raw numeric code.
    pub fn as_u16(self) -> u16 {
        self.0
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        CloseCode(code)
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
