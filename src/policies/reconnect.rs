//! # Reconnect decisions for status connections.
//!
//! [`ReconnectPolicy`] answers one question when a connection closes without
//! being asked to: *retry, and after how long?*
//!
//! ```text
//! close(code) ──► code intentional? ── yes ──► Stop(Intentional)
//!                        │ no
//!                        ▼
//!               attempts < limit? ──── no ───► Stop(Exhausted)
//!                        │ yes
//!                        ▼
//!               Retry { delay = backoff.delay_for(attempts), attempt = attempts + 1 }
//! ```
//!
//! Two variants are used:
//! - per-target connections: [`RetryLimit::Unbounded`], retry until disconnected;
//! - the push stream: [`RetryLimit::Bounded`] with 5 attempts, where the
//!   [`AttemptCounter`] resets to zero on every successful open.

use std::time::Duration;

use super::backoff::Backoff;
use super::close_code::CloseCode;

/// Maximum reconnect attempts of the bounded variant.
pub const PUSH_STREAM_MAX_ATTEMPTS: u32 = 5;

/// How many consecutive reconnects are allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RetryLimit {
    /// Retry until manually disconnected.
    #[default]
    Unbounded,
    /// Give up after this many consecutive failed attempts.
    Bounded(u32),
}

/// Why the policy refused to reconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The close was normal / going away / "do not retry".
    Intentional,
    /// The attempt limit was reached.
    Exhausted,
}

/// Outcome of [`ReconnectPolicy::decide`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reconnect after `delay`; this will be attempt number `attempt` (1-based).
    Retry {
        /// Wait before reconnecting.
        delay: Duration,
        /// Attempt number of the upcoming reconnect.
        attempt: u32,
    },
    /// Do not reconnect.
    Stop(StopReason),
}

/// Reconnect policy: close-code filter, attempt limit and delay schedule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempt limit.
    pub limit: RetryLimit,
    /// Delay schedule.
    pub backoff: Backoff,
}

impl ReconnectPolicy {
    /// Retries forever with the given schedule.
    pub fn unbounded(backoff: Backoff) -> Self {
        Self {
            limit: RetryLimit::Unbounded,
            backoff,
        }
    }

    /// Retries at most `max_attempts` times in a row with the given schedule.
    pub fn bounded(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            limit: RetryLimit::Bounded(max_attempts),
            backoff,
        }
    }

    /// True unless the close was intentional.
    ///
    /// # Example
    /// ```
    /// use callvisor::{CloseCode, ReconnectPolicy};
    ///
    /// let p = ReconnectPolicy::default();
    /// assert!(!p.should_reconnect(CloseCode::NORMAL));
    /// assert!(p.should_reconnect(CloseCode::ABNORMAL));
    /// ```
    pub fn should_reconnect(&self, code: CloseCode) -> bool {
        !code.is_intentional()
    }

    /// Delay before the first reconnect.
    pub fn reconnect_delay(&self) -> Duration {
        self.backoff.delay_for(0)
    }

    /// Decides what to do after a close, given the number of consecutive
    /// reconnect attempts already made since the last successful open.
    pub fn decide(&self, code: CloseCode, attempts: u32) -> ReconnectDecision {
        if !self.should_reconnect(code) {
            return ReconnectDecision::Stop(StopReason::Intentional);
        }
        if let RetryLimit::Bounded(max) = self.limit {
            if attempts >= max {
                return ReconnectDecision::Stop(StopReason::Exhausted);
            }
        }
        ReconnectDecision::Retry {
            delay: self.backoff.delay_for(attempts),
            attempt: attempts.saturating_add(1),
        }
    }
}

/// Consecutive reconnect attempts since the last successful open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttemptCounter {
    attempts: u32,
}

impl AttemptCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts made so far.
    pub fn get(&self) -> u32 {
        self.attempts
    }

    /// Records a scheduled reconnect attempt.
    pub fn bump(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Called on every successful open.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intentional_codes_never_retry() {
        let p = ReconnectPolicy::default();
        for code in [CloseCode::NORMAL, CloseCode::GOING_AWAY, CloseCode::DO_NOT_RETRY] {
            assert!(!p.should_reconnect(code));
            assert_eq!(p.decide(code, 0), ReconnectDecision::Stop(StopReason::Intentional));
        }
    }

    #[test]
    fn other_codes_retry_after_three_seconds() {
        let p = ReconnectPolicy::default();
        for code in [CloseCode::ABNORMAL, CloseCode::SERVER_ERROR, CloseCode(4001)] {
            assert_eq!(
                p.decide(code, 0),
                ReconnectDecision::Retry {
                    delay: Duration::from_secs(3),
                    attempt: 1
                }
            );
        }
        assert_eq!(p.reconnect_delay(), Duration::from_secs(3));
    }

    #[test]
    fn unbounded_never_exhausts() {
        let p = ReconnectPolicy::unbounded(Backoff::default());
        assert!(matches!(
            p.decide(CloseCode::ABNORMAL, 10_000),
            ReconnectDecision::Retry { attempt: 10_001, .. }
        ));
    }

    #[test]
    fn bounded_stops_after_limit_and_counter_reset_restores_budget() {
        let p = ReconnectPolicy::bounded(PUSH_STREAM_MAX_ATTEMPTS, Backoff::default());
        let mut counter = AttemptCounter::new();

        for expected in 1..=PUSH_STREAM_MAX_ATTEMPTS {
            match p.decide(CloseCode::ABNORMAL, counter.get()) {
                ReconnectDecision::Retry { attempt, .. } => {
                    assert_eq!(attempt, expected);
                    counter.bump();
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(
            p.decide(CloseCode::ABNORMAL, counter.get()),
            ReconnectDecision::Stop(StopReason::Exhausted)
        );

        counter.reset();
        assert!(matches!(
            p.decide(CloseCode::ABNORMAL, counter.get()),
            ReconnectDecision::Retry { attempt: 1, .. }
        ));
    }
}
