//! # DispatchEngine: sequential outbound-call loop.
//!
//! Walks a worklist one target at a time, opening the target's status
//! connection before asking the initiation service to place the call.
//!
//! ## Event flow
//! ```text
//! run(worklist, token)
//!   ├─ validate (AlreadyRunning → EmptyWorklist → InvalidTarget / duplicate id)
//!   ├─ store.clear(), publish DispatchStarted
//!   loop {
//!     ├─► token cancelled?             ─► Cancelled
//!     ├─► registry.connect(target)
//!     ├─► store ← Pending,             publish DispatchAttempt
//!     ├─► initiator.initiate(phone)    (optionally bounded by initiate_timeout)
//!     │     ├─ call id  ─► store ← Initiated,  publish InitiationSucceeded
//!     │     └─ anything else ─► store ← Failed, registry.disconnect(target),
//!     │                         publish InitiationFailed
//!     └─► not last? sleep(dispatch_delay) or token cancelled
//!   }
//!   publish DispatchFinished{Completed | Cancelled}
//! ```
//!
//! ## Rules
//! - One session per engine; a second `run` fails with `AlreadyRunning`.
//! - Cancellation is checked once per target. An in-flight initiation is
//!   never interrupted by it, and open connections are left alone.
//! - A per-target failure never ends the session.
//! - `Initiated` is stamped as observed when the request was sent, so a push
//!   received while the request was in flight is kept. `Failed` is stamped
//!   when the failure is observed and always lands.
//! - Initiation events carry the status the store holds after the write.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{DispatchReport, DispatchSession, SessionState};
use crate::adapters::InitiationAdapter;
use crate::config::Config;
use crate::connection::ConnectionRegistry;
use crate::error::{DispatchError, InitiationError};
use crate::events::{Bus, Event, EventKind};
use crate::model::{CallTarget, StatusKind, StatusRecord};
use crate::store::CallStatusStore;

#[derive(Default)]
struct Slot {
    state: SessionState,
    token: Option<CancellationToken>,
}

/// Result of one initiation attempt.
enum Attempt {
    Initiated { call_id: String, message: Option<String> },
    Failed(String),
}

/// Sequential dispatch engine.
pub struct DispatchEngine {
    registry: Arc<ConnectionRegistry>,
    store: Arc<CallStatusStore>,
    initiator: Arc<dyn InitiationAdapter>,
    bus: Bus,
    delay: Duration,
    timeout: Option<Duration>,
    slot: Mutex<Slot>,
}

impl DispatchEngine {
    /// Creates an engine using `cfg`'s pacing and initiation timeout.
    pub fn new(
        cfg: &Config,
        registry: Arc<ConnectionRegistry>,
        store: Arc<CallStatusStore>,
        initiator: Arc<dyn InitiationAdapter>,
        bus: Bus,
    ) -> Self {
        Self {
            registry,
            store,
            initiator,
            bus,
            delay: cfg.dispatch_delay,
            timeout: cfg.initiate_timeout(),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Runs one session over `worklist` until it is exhausted or `cancel` fires.
    ///
    /// Usage errors are returned before anything is touched:
    /// `AlreadyRunning`, then `EmptyWorklist`, then `InvalidTarget`.
    pub async fn run(
        &self,
        worklist: Vec<CallTarget>,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, DispatchError> {
        {
            let mut slot = self.slot();
            if slot.state == SessionState::Running {
                return Err(DispatchError::AlreadyRunning);
            }
            if worklist.is_empty() {
                return Err(DispatchError::EmptyWorklist);
            }
            let mut seen = HashSet::with_capacity(worklist.len());
            for target in &worklist {
                target.validate()?;
                if !seen.insert(&target.id) {
                    return Err(DispatchError::InvalidTarget {
                        id: target.id.to_string(),
                        reason: "duplicate id in worklist".to_string(),
                    });
                }
            }
            slot.state = SessionState::Running;
            slot.token = Some(cancel.clone());
        }
        let mut guard = RunningGuard {
            engine: self,
            outcome: SessionState::Cancelled,
        };

        self.store.clear().await;
        let mut session = DispatchSession::new(worklist, cancel);
        info!(targets = session.len(), "dispatch started");
        self.bus.publish(
            Event::new(EventKind::DispatchStarted)
                .with_session(SessionState::Running)
                .with_attempt(session.len() as u32),
        );

        let mut report = DispatchReport {
            state: SessionState::Running,
            attempted: 0,
            initiated: 0,
            failed: 0,
        };

        report.state = loop {
            if session.is_cancelled() {
                break SessionState::Cancelled;
            }
            let Some(target) = session.current().cloned() else {
                break SessionState::Completed;
            };

            report.attempted += 1;
            if self.dispatch_one(&target).await {
                report.initiated += 1;
            } else {
                report.failed += 1;
            }
            session.advance();

            if session.is_exhausted() {
                break SessionState::Completed;
            }
            if !self.delay.is_zero() {
                select! {
                    _ = time::sleep(self.delay) => {}
                    _ = session.token().cancelled() => {}
                }
            }
        };

        guard.outcome = report.state;
        drop(guard);
        info!(
            state = %report.state,
            attempted = report.attempted,
            initiated = report.initiated,
            failed = report.failed,
            "dispatch finished"
        );
        self.bus.publish(
            Event::new(EventKind::DispatchFinished)
                .with_session(report.state)
                .with_attempt(report.attempted as u32),
        );
        Ok(report)
    }

    /// Cancels the running session, if any.
    ///
    /// The current initiation (if in flight) completes; no further target is
    /// started.
    pub fn cancel(&self) {
        if let Some(token) = &self.slot().token {
            token.cancel();
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.slot().state
    }

    /// True while a session is running.
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Dispatches one target. Returns `true` if the call was initiated.
    async fn dispatch_one(&self, target: &CallTarget) -> bool {
        if let Err(e) = self.registry.connect(target).await {
            warn!(target_id = %target.id, error = %e, "status connection not opened");
        }

        let pending = StatusRecord::new(target.id.clone(), StatusKind::Pending);
        self.store.upsert(pending.clone()).await;
        self.bus
            .publish(Event::from_record(EventKind::DispatchAttempt, &pending));

        match self.initiate(target).await {
            Attempt::Initiated { call_id, message } => {
                debug!(target_id = %target.id, call_id = %call_id, "call initiated");
                let record = StatusRecord::new(target.id.clone(), StatusKind::Initiated)
                    .with_call_id(call_id.as_str())
                    .observed_with(&pending);
                let stored = self.record(record).await;

                let mut ev = Event::from_record(EventKind::InitiationSucceeded, &stored)
                    .with_call_id(call_id);
                if let Some(m) = message {
                    ev = ev.with_reason(m);
                }
                self.bus.publish(ev);
                true
            }
            Attempt::Failed(reason) => {
                warn!(target_id = %target.id, reason = %reason, "initiation failed");
                let record = StatusRecord::new(target.id.clone(), StatusKind::Failed)
                    .with_detail(reason.as_str());
                let stored = self.record(record).await;
                self.registry.disconnect(&target.id).await;
                self.bus.publish(
                    Event::from_record(EventKind::InitiationFailed, &stored).with_reason(reason),
                );
                false
            }
        }
    }

    /// Writes an engine record and returns what the store holds afterwards.
    ///
    /// `Initiated` shares the pending record's stamp, so a status pushed while
    /// the request was in flight wins over it.
    async fn record(&self, record: StatusRecord) -> StatusRecord {
        match self.store.upsert_latest(record).await {
            Ok(applied) => applied,
            Err(newer) => {
                debug!(target_id = %newer.target_id, stored = %newer.status, "newer pushed status kept");
                newer
            }
        }
    }

    async fn initiate(&self, target: &CallTarget) -> Attempt {
        let call = self.initiator.initiate(&target.phone_number);
        let result = match self.timeout {
            Some(timeout) => match time::timeout(timeout, call).await {
                Ok(res) => res,
                Err(_elapsed) => Err(InitiationError::Timeout { timeout }),
            },
            None => call.await,
        };

        match result {
            Ok(outcome) => match outcome.call_id() {
                Some(id) => Attempt::Initiated {
                    call_id: id.to_string(),
                    message: outcome.message.clone(),
                },
                None => Attempt::Failed(outcome.failure_reason()),
            },
            Err(e) => {
                debug!(target_id = %target.id, label = e.as_label(), "initiation error");
                Attempt::Failed(e.as_message())
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leaves the engine in a finished state even if `run` is dropped mid-session.
struct RunningGuard<'a> {
    engine: &'a DispatchEngine,
    outcome: SessionState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.engine.slot();
        slot.state = self.outcome;
        slot.token = None;
    }
}
