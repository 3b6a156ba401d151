//! # Connection registry: one status connection per target.
//!
//! The registry owns every live [`ConnectionActor`] and every pending
//! reconnect timer. Actors report through a typed channel that the registry's
//! listener consumes:
//!
//! ## Architecture
//! ```text
//! connect(target) ──► Slots.handles[target] = Handle{generation, token, join}
//!                          └──► spawn ConnectionActor::run(token)
//!
//! ConnectionActor ── ConnectionEvent ──► Registry.event_listener()
//!     ├─► Opened            → reset attempts, publish ConnectionOpened
//!     ├─► Pushed(msg)       → store.upsert(record), publish StatusPushed
//!     │                       (stale: publish StatusRejected)
//!     ├─► Error(err)        → publish ConnectionError
//!     └─► Closed(code)      → drop handle, policy.decide(code, attempts)
//!                                ├─ Retry → Slots.timers[target] = Timer{generation, token}
//!                                │          publish ReconnectScheduled
//!                                └─ Stop  → publish ReconnectExhausted
//!
//! timer fires ──► Slots.timers[target] still ours? ──► open a fresh connection
//! ```
//!
//! ## Rules
//! - At most **one** handle per target; `connect` on a live target is a no-op.
//! - Handles and timers live in one [`Slots`] value behind a single mutex.
//! - `disconnect` removes the handle **and** the timer under that lock, so a
//!   close reported moments later belongs to a stale generation and is ignored.
//! - Open and stream failures never reach the caller of `connect`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::actor::{ConnectionActor, ConnectionEvent, ConnectionEventKind};
use super::transport::Connector;
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};
use crate::model::{CallTarget, TargetId};
use crate::policies::{CloseCode, ReconnectDecision, ReconnectPolicy, StopReason};
use crate::store::CallStatusStore;

/// Live connection owned by the registry.
struct Handle {
    target: CallTarget,
    generation: u64,
    /// Consecutive reconnect attempts that led to this connection.
    attempts: u32,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Pending reconnect.
struct Timer {
    generation: u64,
    cancel: CancellationToken,
}

/// Handle and timer maps, guarded together.
#[derive(Default)]
struct Slots {
    handles: HashMap<TargetId, Handle>,
    timers: HashMap<TargetId, Timer>,
}

/// Registry of per-target status connections.
pub struct ConnectionRegistry {
    slots: Mutex<Slots>,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    store: Arc<CallStatusStore>,
    bus: Bus,
    runtime_token: CancellationToken,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<ConnectionEvent>>>,
    generations: AtomicU64,
}

impl ConnectionRegistry {
    /// Creates a new registry.
    ///
    /// Call [`spawn_listener`](Self::spawn_listener) once before connecting.
    pub fn new(
        connector: Arc<dyn Connector>,
        policy: ReconnectPolicy,
        store: Arc<CallStatusStore>,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            slots: Mutex::new(Slots::default()),
            connector,
            policy,
            store,
            bus,
            runtime_token,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            generations: AtomicU64::new(1),
        })
    }

    /// Spawns the listener that consumes connection events.
    ///
    /// Runs until the runtime token is cancelled. Calling it twice is a no-op.
    pub fn spawn_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let me = Arc::clone(self);
        let rt = self.runtime_token.clone();

        tokio::spawn(async move {
            let Some(mut rx) = me.events_rx.lock().await.take() else {
                return;
            };
            loop {
                tokio::select! {
                    _ = rt.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Some(ev) => me.handle_event(ev).await,
                        None => break,
                    }
                }
            }
            me.cancel_all().await;
        })
    }

    /// Opens a status connection for `target` unless one is already live.
    ///
    /// A pending reconnect timer for the target is cancelled and replaced by
    /// an immediate connection.
    pub async fn connect(&self, target: &CallTarget) -> Result<(), DispatchError> {
        target.validate()?;

        let mut slots = self.slots.lock().await;
        if slots.handles.contains_key(&target.id) {
            debug!(target_id = %target.id, "status connection already live");
            return Ok(());
        }
        if let Some(timer) = slots.timers.remove(&target.id) {
            timer.cancel.cancel();
        }
        self.open_locked(&mut slots, target.clone(), 0);
        Ok(())
    }

    /// Closes the connection for `id` and cancels its pending reconnect.
    ///
    /// Returns `true` if anything was removed.
    pub async fn disconnect(&self, id: &TargetId) -> bool {
        let removed = {
            let mut slots = self.slots.lock().await;
            Self::release_locked(&mut slots, id)
        };
        if removed {
            info!(target_id = %id, "status connection disconnected");
            self.bus
                .publish(Event::new(EventKind::Disconnected).with_target(id.clone()));
        }
        removed
    }

    /// Disconnects every target and cancels every pending reconnect.
    pub async fn disconnect_all(&self) {
        let ids: Vec<TargetId> = {
            let mut slots = self.slots.lock().await;
            let mut ids: Vec<TargetId> = slots
                .handles
                .keys()
                .chain(slots.timers.keys())
                .cloned()
                .collect();
            ids.sort_unstable();
            ids.dedup();
            for id in &ids {
                Self::release_locked(&mut slots, id);
            }
            ids
        };
        for id in ids {
            self.bus
                .publish(Event::new(EventKind::Disconnected).with_target(id));
        }
    }

    /// Cancels everything and waits for actors to exit.
    pub async fn cancel_all(&self) {
        let handles: Vec<Handle> = {
            let mut slots = self.slots.lock().await;
            for (_, timer) in slots.timers.drain() {
                timer.cancel.cancel();
            }
            slots.handles.drain().map(|(_, h)| h).collect()
        };
        for h in &handles {
            h.cancel.cancel();
        }
        for h in handles {
            if h.join.await.is_err() {
                warn!(target_id = %h.target.id, "status connection actor panicked");
            }
        }
    }

    /// True if a connection handle exists for `id`.
    pub async fn is_connected(&self, id: &TargetId) -> bool {
        self.slots.lock().await.handles.contains_key(id)
    }

    /// True if a reconnect is scheduled for `id`.
    pub async fn has_pending_reconnect(&self, id: &TargetId) -> bool {
        self.slots.lock().await.timers.contains_key(id)
    }

    /// Sorted ids with a connection handle.
    pub async fn connected(&self) -> Vec<TargetId> {
        let slots = self.slots.lock().await;
        let mut ids: Vec<TargetId> = slots.handles.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    // ---------------------------
    // Event handling
    // ---------------------------

    async fn handle_event(self: &Arc<Self>, ev: ConnectionEvent) {
        match ev.kind {
            ConnectionEventKind::Pushed(msg) => {
                let record = msg.into_record(ev.target);
                match self.store.upsert_latest(record.clone()).await {
                    Ok(applied) => self
                        .bus
                        .publish(Event::from_record(EventKind::StatusPushed, &applied)),
                    Err(kept) => {
                        warn!(
                            target_id = %record.target_id,
                            status = %record.status,
                            stored = %kept.status,
                            "stale push dropped"
                        );
                        self.bus.publish(Event::status_rejected(&record, &kept));
                    }
                }
            }
            ConnectionEventKind::Opened => {
                let attempt = {
                    let mut slots = self.slots.lock().await;
                    match slots.handles.get_mut(&ev.target) {
                        Some(h) if h.generation == ev.generation => std::mem::take(&mut h.attempts),
                        _ => return,
                    }
                };
                info!(target_id = %ev.target, "status connection open");
                self.bus.publish(
                    Event::new(EventKind::ConnectionOpened)
                        .with_target(ev.target)
                        .with_attempt(attempt),
                );
            }
            ConnectionEventKind::Error(err) => {
                if !self.is_current(&ev.target, ev.generation).await {
                    return;
                }
                warn!(target_id = %ev.target, error = %err, label = err.as_label(), "status connection error");
                self.bus.publish(
                    Event::new(EventKind::ConnectionError)
                        .with_target(ev.target)
                        .with_reason(err.to_string()),
                );
            }
            ConnectionEventKind::Closed(code) => {
                self.on_closed(ev.target, ev.generation, code).await;
            }
        }
    }

    async fn on_closed(self: &Arc<Self>, id: TargetId, generation: u64, code: CloseCode) {
        let mut slots = self.slots.lock().await;
        let current = matches!(slots.handles.get(&id), Some(h) if h.generation == generation);
        let Some(handle) = current.then(|| slots.handles.remove(&id)).flatten() else {
            debug!(target_id = %id, generation, "close from released connection ignored");
            return;
        };

        self.bus.publish(
            Event::new(EventKind::ConnectionClosed)
                .with_target(id.clone())
                .with_code(code.as_u16()),
        );

        match self.policy.decide(code, handle.attempts) {
            ReconnectDecision::Retry { delay, attempt } => {
                let timer_gen = self.next_generation();
                let cancel = self.runtime_token.child_token();
                slots.timers.insert(
                    id.clone(),
                    Timer {
                        generation: timer_gen,
                        cancel: cancel.clone(),
                    },
                );
                drop(slots);

                info!(target_id = %id, code = %code, ?delay, attempt, "reconnect scheduled");
                self.bus.publish(
                    Event::new(EventKind::ReconnectScheduled)
                        .with_target(id.clone())
                        .with_code(code.as_u16())
                        .with_delay(delay)
                        .with_attempt(attempt),
                );

                let me = Arc::clone(self);
                let target = handle.target;
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(delay) => me.fire_timer(target, timer_gen, attempt).await,
                    }
                });
            }
            ReconnectDecision::Stop(reason) => {
                drop(slots);
                let why = match reason {
                    StopReason::Intentional => "intentional close",
                    StopReason::Exhausted => "reconnect attempts exhausted",
                };
                info!(target_id = %id, code = %code, why, "status connection not reopened");
                self.bus.publish(
                    Event::new(EventKind::ReconnectExhausted)
                        .with_target(id)
                        .with_code(code.as_u16())
                        .with_attempt(handle.attempts)
                        .with_reason(why),
                );
            }
        }
    }

    /// Reopens `target` if the timer `generation` is still the scheduled one.
    async fn fire_timer(&self, target: CallTarget, generation: u64, attempts: u32) {
        let mut slots = self.slots.lock().await;
        if !matches!(slots.timers.get(&target.id), Some(t) if t.generation == generation) {
            return;
        }
        slots.timers.remove(&target.id);
        if slots.handles.contains_key(&target.id) {
            return;
        }
        debug!(target_id = %target.id, attempts, "reconnecting");
        self.open_locked(&mut slots, target, attempts);
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn open_locked(&self, slots: &mut Slots, target: CallTarget, attempts: u32) {
        let generation = self.next_generation();
        let cancel = self.runtime_token.child_token();
        let actor = ConnectionActor::new(
            target.clone(),
            generation,
            Arc::clone(&self.connector),
            self.events_tx.clone(),
        );
        let token = cancel.clone();
        let join = tokio::spawn(async move { actor.run(token).await });

        slots.handles.insert(
            target.id.clone(),
            Handle {
                target,
                generation,
                attempts,
                cancel,
                join,
            },
        );
    }

    fn release_locked(slots: &mut Slots, id: &TargetId) -> bool {
        let mut removed = false;
        if let Some(h) = slots.handles.remove(id) {
            h.cancel.cancel();
            removed = true;
        }
        if let Some(t) = slots.timers.remove(id) {
            t.cancel.cancel();
            removed = true;
        }
        removed
    }

    async fn is_current(&self, id: &TargetId, generation: u64) -> bool {
        matches!(self.slots.lock().await.handles.get(id), Some(h) if h.generation == generation)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::StatusRecord;
    use crate::policies::Backoff;
    use crate::testing::{FakeConnector, wait_for};

    struct Rig {
        registry: Arc<ConnectionRegistry>,
        connector: FakeConnector,
        store: Arc<CallStatusStore>,
        bus: Bus,
        token: CancellationToken,
    }

    fn rig() -> Rig {
        let connector = FakeConnector::new();
        let store = Arc::new(CallStatusStore::new());
        let bus = Bus::new(256);
        let token = CancellationToken::new();
        let registry = ConnectionRegistry::new(
            Arc::new(connector.clone()),
            ReconnectPolicy::unbounded(Backoff::default()),
            Arc::clone(&store),
            bus.clone(),
            token.clone(),
        );
        registry.spawn_listener();
        Rig {
            registry,
            connector,
            store,
            bus,
            token,
        }
    }

    fn ada() -> CallTarget {
        CallTarget::new("1", "+15550001", "Ada")
    }

    #[tokio::test(start_paused = true)]
    async fn double_connect_keeps_a_single_handle() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();

        rig.registry.connect(&ada()).await.unwrap();
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;
        rig.registry.connect(&ada()).await.unwrap();

        assert_eq!(rig.registry.connected().await, vec![TargetId::from("1")]);
        assert_eq!(rig.connector.open_count(&TargetId::from("1")), 1);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn pushed_status_lands_in_store_and_on_bus() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector
            .push(&TargetId::from("1"), r#"{"sid":"CA7","status":"ringing","number":"+15550001"}"#);
        let ev = wait_for(&mut rx, EventKind::StatusPushed).await;

        assert_eq!(ev.status, Some(crate::StatusKind::Ringing));
        assert_eq!(ev.call_id.as_deref(), Some("CA7"));
        let rec = rig.store.get(&TargetId::from("1")).await.unwrap();
        assert_eq!(rec.status, crate::StatusKind::Ringing);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn push_older_than_stored_record_is_reported() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        let mut newest = StatusRecord::new(id.clone(), crate::StatusKind::Completed);
        newest.seq = u64::MAX;
        rig.store.upsert(newest).await;
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector
            .push(&id, r#"{"sid":"CA7","status":"ringing","number":"+15550001"}"#);
        let ev = wait_for(&mut rx, EventKind::StatusRejected).await;

        assert_eq!(ev.status, Some(crate::StatusKind::Ringing));
        assert_eq!(ev.reason.as_deref(), Some("stored status completed is newer"));
        let rec = rig.store.get(&id).await.unwrap();
        assert_eq!(rec.status, crate::StatusKind::Completed);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn undecodable_push_is_reported_without_closing() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector.push(&TargetId::from("1"), "not json");
        let ev = wait_for(&mut rx, EventKind::ConnectionError).await;
        assert!(ev.reason.as_deref().unwrap_or_default().contains("not json"));
        assert!(rig.registry.is_connected(&TargetId::from("1")).await);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn abnormal_close_reconnects_after_fixed_delay() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector.drop_with(&id, CloseCode::ABNORMAL);
        let ev = wait_for(&mut rx, EventKind::ReconnectScheduled).await;
        assert_eq!(ev.delay_ms, Some(3000));
        assert_eq!(ev.attempt, Some(1));
        assert!(rig.registry.has_pending_reconnect(&id).await);
        assert!(!rig.registry.is_connected(&id).await);

        let ev = wait_for(&mut rx, EventKind::ConnectionOpened).await;
        assert_eq!(ev.attempt, Some(1));
        assert_eq!(rig.connector.open_count(&id), 2);
        assert!(!rig.registry.has_pending_reconnect(&id).await);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn intentional_close_is_not_retried() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector.drop_with(&id, CloseCode::DO_NOT_RETRY);
        let ev = wait_for(&mut rx, EventKind::ReconnectExhausted).await;
        assert_eq!(ev.code, Some(4000));
        assert!(!rig.registry.is_connected(&id).await);
        assert!(!rig.registry.has_pending_reconnect(&id).await);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn open_failure_is_reported_and_retried() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        rig.connector.fail_opens(&id, 1);

        rig.registry.connect(&ada()).await.unwrap();
        let ev = wait_for(&mut rx, EventKind::ConnectionError).await;
        assert!(ev.reason.as_deref().unwrap_or_default().contains("open failed"));
        wait_for(&mut rx, EventKind::ReconnectScheduled).await;
        wait_for(&mut rx, EventKind::ConnectionOpened).await;
        assert_eq!(rig.connector.open_count(&id), 2);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector.drop_with(&id, CloseCode::ABNORMAL);
        wait_for(&mut rx, EventKind::ReconnectScheduled).await;
        assert!(rig.registry.disconnect(&id).await);
        assert!(!rig.registry.has_pending_reconnect(&id).await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rig.connector.open_count(&id), 1);
        assert!(!rig.registry.is_connected(&id).await);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn late_close_after_disconnect_does_not_reconnect() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let id = TargetId::from("1");
        rig.registry.connect(&ada()).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        // The transport reports an abnormal close right after we let go.
        assert!(rig.registry.disconnect(&id).await);
        rig.connector.drop_with(&id, CloseCode::ABNORMAL);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rig.connector.open_count(&id), 1);
        assert!(!rig.registry.has_pending_reconnect(&id).await);
        assert_eq!(rig.connector.closes(&id), vec![CloseCode::NORMAL]);
        rig.token.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_all_releases_everything() {
        let rig = rig();
        let mut rx = rig.bus.subscribe();
        let bob = CallTarget::new("2", "+15550002", "Bob");
        rig.registry.connect(&ada()).await.unwrap();
        rig.registry.connect(&bob).await.unwrap();
        wait_for(&mut rx, EventKind::ConnectionOpened).await;
        wait_for(&mut rx, EventKind::ConnectionOpened).await;

        rig.connector.drop_with(&bob.id, CloseCode::ABNORMAL);
        wait_for(&mut rx, EventKind::ReconnectScheduled).await;

        rig.registry.disconnect_all().await;
        assert!(rig.registry.connected().await.is_empty());
        assert!(!rig.registry.has_pending_reconnect(&bob.id).await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rig.connector.open_count(&bob.id), 1);
        rig.token.cancel();
    }

    #[tokio::test]
    async fn malformed_target_is_rejected() {
        let rig = rig();
        let err = rig
            .registry
            .connect(&CallTarget::new("1", "call me", ""))
            .await
            .unwrap_err();
        assert_eq!(err.as_label(), "dispatch_invalid_target");
        assert!(rig.registry.connected().await.is_empty());
        rig.token.cancel();
    }
}
