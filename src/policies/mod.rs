//! Reconnect policies.
//!
//! This module groups the knobs that control **if** a closed status
//! connection is reopened and **how long** to wait first.
//!
//! ## Contents
//! - [`CloseCode`]        why a connection ended
//! - [`ReconnectPolicy`]  retry decision (close-code filter + attempt limit)
//! - [`Backoff`]          delay schedule (first / factor / max + jitter)
//! - [`Jitter`]           randomisation to avoid reconnect storms
//!
//! ## Quick wiring
//! ```text
//! ConnectionRegistry ── Closed(code) ──► policy.decide(code, attempts)
//!                                            ├─ Retry{delay} ─► timer ─► connect(target)
//!                                            └─ Stop         ─► drop handle
//! ```
//!
//! ## Defaults
//! - `ReconnectPolicy::default()` → unbounded, 3s constant delay, no jitter.
//! - The push stream uses `ReconnectPolicy::bounded(5, ..)`.

mod backoff;
mod close_code;
mod jitter;
mod reconnect;

pub use backoff::{Backoff, RECONNECT_DELAY};
pub use close_code::CloseCode;
pub use jitter::Jitter;
pub use reconnect::{
    AttemptCounter, PUSH_STREAM_MAX_ATTEMPTS, ReconnectDecision, ReconnectPolicy, RetryLimit,
    StopReason,
};
