//! # Server-sent-events status channel.
//!
//! [`PushStream`] is the alternative to per-target websockets: a single SSE
//! subscription carrying status updates for every number of a batch.
//!
//! ## Event flow
//! ```text
//! GET <url> (Accept: text/event-stream)
//!   ├─ non-2xx / transport error ─► retry (bounded)
//!   └─ 2xx ─► attempts.reset()
//!        loop {
//!          token cancelled     ─► exit Cancelled
//!          "status-update"     ─► store.upsert(record), publish StatusPushed
//!          "batch-completed"   ─► publish BatchCompleted, close after batch_linger
//!          stream error / end  ─► retry (bounded)
//!        }
//!
//! retry: policy.decide(1006, attempts)
//!   ├─ Retry{delay} ─► publish ReconnectScheduled, sleep (cancellable)
//!   └─ Stop         ─► publish ReconnectExhausted, exit Exhausted
//! ```
//!
//! Updates are routed to targets by phone number; numbers that were never
//! [tracked](PushStream::track) are keyed by the number itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures::StreamExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{CallTarget, PushMessage, TargetId};
use crate::policies::{AttemptCounter, CloseCode, ReconnectDecision, ReconnectPolicy};
use crate::store::CallStatusStore;

/// SSE event name carrying a push message.
pub const STATUS_UPDATE: &str = "status-update";
/// SSE event name marking the end of a batch.
pub const BATCH_COMPLETED: &str = "batch-completed";

/// Why [`PushStream::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushStreamEnd {
    /// The token was cancelled.
    Cancelled,
    /// The server reported `batch-completed`.
    BatchCompleted,
    /// The reconnect limit was reached.
    Exhausted,
}

/// How a single subscription ended.
enum Session {
    Cancelled,
    Batch,
    Dropped(String),
}

/// Bounded-retry SSE status subscription.
pub struct PushStream {
    client: reqwest::Client,
    url: String,
    routes: HashMap<String, TargetId>,
    store: Arc<CallStatusStore>,
    bus: Bus,
    policy: ReconnectPolicy,
    linger: Duration,
}

impl PushStream {
    /// Creates a push stream for `url` using the config's bounded policy and linger.
    pub fn new(url: impl Into<String>, cfg: &Config, store: Arc<CallStatusStore>, bus: Bus) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            routes: HashMap::new(),
            store,
            bus,
            policy: cfg.push_stream_policy(),
            linger: cfg.batch_linger,
        }
    }

    /// Routes updates for these targets' numbers to their ids.
    pub fn track<'a>(mut self, targets: impl IntoIterator<Item = &'a CallTarget>) -> Self {
        for t in targets {
            self.routes.insert(t.phone_number.clone(), t.id.clone());
        }
        self
    }

    /// Overrides the reconnect policy.
    pub fn with_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Runs until cancelled, the batch completes, or retries are exhausted.
    pub async fn run(&self, token: CancellationToken) -> PushStreamEnd {
        let mut attempts = AttemptCounter::new();

        loop {
            let why = match self.session(&token, &mut attempts).await {
                Ok(Session::Cancelled) => return PushStreamEnd::Cancelled,
                Ok(Session::Batch) => return PushStreamEnd::BatchCompleted,
                Ok(Session::Dropped(why)) => why,
                Err(e) => {
                    warn!(url = %self.url, error = %e, label = e.as_label(), "push stream unavailable");
                    e.to_string()
                }
            };

            match self.policy.decide(CloseCode::ABNORMAL, attempts.get()) {
                ReconnectDecision::Retry { delay, attempt } => {
                    attempts.bump();
                    info!(url = %self.url, ?delay, attempt, "push stream reconnect scheduled");
                    self.bus.publish(
                        Event::new(EventKind::ReconnectScheduled)
                            .with_code(CloseCode::ABNORMAL.as_u16())
                            .with_delay(delay)
                            .with_attempt(attempt)
                            .with_reason(why),
                    );
                    tokio::select! {
                        _ = token.cancelled() => return PushStreamEnd::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                ReconnectDecision::Stop(_) => {
                    warn!(url = %self.url, attempts = attempts.get(), "push stream given up");
                    self.bus.publish(
                        Event::new(EventKind::ReconnectExhausted)
                            .with_attempt(attempts.get())
                            .with_reason(why),
                    );
                    return PushStreamEnd::Exhausted;
                }
            }
        }
    }

    async fn session(
        &self,
        token: &CancellationToken,
        attempts: &mut AttemptCounter,
    ) -> Result<Session, ClientError> {
        let request = self
            .client
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send();
        let resp = tokio::select! {
            _ = token.cancelled() => return Ok(Session::Cancelled),
            resp = request => resp?,
        };
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        attempts.reset();
        debug!(url = %self.url, "push stream open");

        let mut events = resp.bytes_stream().eventsource();
        let mut linger_until: Option<Instant> = None;

        loop {
            let deadline = linger_until.unwrap_or_else(Instant::now);
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(Session::Cancelled),
                _ = tokio::time::sleep_until(deadline), if linger_until.is_some() => {
                    return Ok(Session::Batch);
                }
                next = events.next() => match next {
                    Some(Ok(ev)) if ev.event == STATUS_UPDATE => self.apply(&ev.data).await,
                    Some(Ok(ev)) if ev.event == BATCH_COMPLETED => {
                        info!(url = %self.url, "batch completed");
                        self.bus.publish(Event::new(EventKind::BatchCompleted).with_reason(ev.data));
                        if linger_until.is_none() {
                            linger_until = Some(Instant::now() + self.linger);
                        }
                    }
                    Some(Ok(ev)) => debug!(event = %ev.event, "push stream event ignored"),
                    Some(Err(e)) if linger_until.is_some() => {
                        debug!(error = %e, "push stream broke while lingering");
                        return Ok(Session::Batch);
                    }
                    Some(Err(e)) => return Ok(Session::Dropped(e.to_string())),
                    None if linger_until.is_some() => return Ok(Session::Batch),
                    None => return Ok(Session::Dropped("stream ended".to_string())),
                },
            }
        }
    }

    async fn apply(&self, data: &str) {
        let msg = match PushMessage::parse(data) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, data, "undecodable status update");
                self.bus.publish(
                    Event::new(EventKind::ConnectionError).with_reason(format!("undecodable push: {e}: {data}")),
                );
                return;
            }
        };
        let target = self
            .routes
            .get(&msg.number)
            .cloned()
            .unwrap_or_else(|| TargetId::from(msg.number.as_str()));
        let record = msg.into_record(target);
        match self.store.upsert_latest(record.clone()).await {
            Ok(applied) => self
                .bus
                .publish(Event::from_record(EventKind::StatusPushed, &applied)),
            Err(kept) => {
                warn!(
                    target_id = %record.target_id,
                    status = %record.status,
                    stored = %kept.status,
                    "stale status update dropped"
                );
                self.bus.publish(Event::status_rejected(&record, &kept));
            }
        }
    }
}
