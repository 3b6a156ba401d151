//! # Campaign runtime configuration.
//!
//! [`Config`] centralises the settings of every component:
//! endpoints, dispatch pacing, reconnect schedule and bus sizing.
//!
//! ## Sentinel values
//! - `initiate_timeout = 0s` → wait for the initiation service indefinitely
//! - `dispatch_delay = 0s` → no pacing between targets

use std::time::Duration;

use crate::policies::{Backoff, PUSH_STREAM_MAX_ATTEMPTS, ReconnectPolicy};

/// Global configuration for a campaign.
///
/// ## Field semantics
/// - `ws_base`: base of per-target status endpoints, `<ws_base>/ws/<phone>`
/// - `api_base`: base of the REST collaborators (`/calls/outbound`, `/clients/pending`)
/// - `dispatch_delay`: pause between two initiations of one session
/// - `initiate_timeout`: bound on one initiation call (`0s` = unbounded)
/// - `reconnect`: delay schedule for status connections
/// - `push_max_attempts`: consecutive reconnects allowed for the push stream
/// - `batch_linger`: how long the push stream stays open after `batch-completed`
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `page_size`: page size used when walking the pending-contact listing
#[derive(Clone, Debug)]
pub struct Config {
    /// Base address of the status connections, e.g. `ws://127.0.0.1:8000`.
    pub ws_base: String,

    /// Base address of the REST collaborators, e.g. `http://127.0.0.1:8000`.
    pub api_base: String,

    /// Fixed pause between consecutive initiations of a session.
    ///
    /// Throttles the remote initiation service; not needed for correctness.
    pub dispatch_delay: Duration,

    /// Upper bound for one initiation call.
    ///
    /// - `Duration::ZERO` = no bound; a hung call stalls the session
    /// - `> 0` = the call is abandoned and the target recorded as failed
    pub initiate_timeout: Duration,

    /// Reconnect delay schedule for per-target status connections.
    pub reconnect: Backoff,

    /// Consecutive reconnect attempts allowed for the push stream.
    pub push_max_attempts: u32,

    /// Grace before the push stream closes itself after `batch-completed`.
    pub batch_linger: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,

    /// Page size for the pending-contact listing.
    pub page_size: u32,
}

impl Config {
    /// Initiation timeout as an `Option` (`None` = unbounded).
    #[inline]
    pub fn initiate_timeout(&self) -> Option<Duration> {
        if self.initiate_timeout == Duration::ZERO {
            None
        } else {
            Some(self.initiate_timeout)
        }
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// REST endpoint under `api_base`.
    ///
    /// # Example
    /// ```
    /// use callvisor::Config;
    ///
    /// let cfg = Config { api_base: "http://dialer:9000/".into(), ..Config::default() };
    /// assert_eq!(cfg.api_url("/calls/outbound"), "http://dialer:9000/calls/outbound");
    /// ```
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Reconnect policy for per-target status connections (unbounded).
    pub fn connection_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::unbounded(self.reconnect)
    }

    /// Reconnect policy for the push stream (bounded).
    pub fn push_stream_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::bounded(self.push_max_attempts, self.reconnect)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - endpoints on `127.0.0.1:8000`
    /// - `dispatch_delay = 500ms`
    /// - `initiate_timeout = 0s` (unbounded)
    /// - `reconnect = 3s` constant
    /// - `push_max_attempts = 5`
    /// - `batch_linger = 1s`
    /// - `bus_capacity = 1024`
    /// - `page_size = 50`
    fn default() -> Self {
        Self {
            ws_base: "ws://127.0.0.1:8000".to_string(),
            api_base: "http://127.0.0.1:8000".to_string(),
            dispatch_delay: Duration::from_millis(500),
            initiate_timeout: Duration::ZERO,
            reconnect: Backoff::default(),
            push_max_attempts: PUSH_STREAM_MAX_ATTEMPTS,
            batch_linger: Duration::from_secs(1),
            bus_capacity: 1024,
            page_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_timeout_means_unbounded() {
        let mut cfg = Config::default();
        assert_eq!(cfg.initiate_timeout(), None);
        cfg.initiate_timeout = Duration::from_secs(10);
        assert_eq!(cfg.initiate_timeout(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn api_url_joins_slashes_once() {
        let cfg = Config {
            api_base: "http://api/".into(),
            ..Config::default()
        };
        assert_eq!(cfg.api_url("/calls/outbound"), "http://api/calls/outbound");
        assert_eq!(cfg.api_url("clients/pending"), "http://api/clients/pending");
    }
}
