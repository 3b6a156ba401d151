//! # Reconnect delay schedule.
//!
//! [`Backoff`] computes the wait before reconnect attempt `n` (0-indexed) as
//! `first × factor^n`, clamped to `max`, then jittered. The defaults give the
//! fixed 3 second delay status connections use: `factor = 1.0`, no jitter.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Backoff, Jitter};
//!
//! assert_eq!(Backoff::default().delay_for(7), Duration::from_secs(3));
//!
//! let growing = Backoff {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(4),
//!     factor: 2.0,
//!     jitter: Jitter::None,
//! };
//! assert_eq!(growing.delay_for(1), Duration::from_secs(1));
//! assert_eq!(growing.delay_for(9), Duration::from_secs(4));
//! ```

use std::time::Duration;

use super::jitter::Jitter;

/// Default delay between a close and the next reconnect.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Reconnect delay schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Delay before the first reconnect.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Growth factor per attempt (`1.0` = constant).
    pub factor: f64,
    /// Randomisation applied after clamping.
    pub jitter: Jitter,
}

impl Default for Backoff {
    /// Constant 3s, capped at 30s, no jitter.
    fn default() -> Self {
        Self {
            first: RECONNECT_DELAY,
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: Jitter::None,
        }
    }
}

impl Backoff {
    /// Constant delay without jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: Jitter::None,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-indexed).
    ///
    /// The base is derived from the attempt number only, so jitter never
    /// feeds back into later delays.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}
