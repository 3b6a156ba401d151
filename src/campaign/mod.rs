//! # Campaign: wiring and lifecycle.
//!
//! [`Campaign`] owns one instance of every component and the background tasks
//! that connect them.
//!
//! ## Architecture
//! ```text
//! CampaignBuilder::build()
//!   ├─► Bus, CallStatusStore
//!   ├─► ConnectionRegistry  (+ listener task: ConnectionEvent ─► store / Bus)
//!   ├─► DispatchEngine
//!   └─► forwarder task:  Bus ─► SubscriberSet::emit()
//!
//! dispatch(worklist) ──► engine.run(worklist, runtime_token.child_token())
//! cancel()           ──► engine.cancel()                      (connections stay open)
//! hard_stop()        ──► engine.cancel() + registry.disconnect_all()
//! shutdown()         ──► hard_stop() + ShutdownRequested + stop listeners
//! run_until_signal() ──► dispatch(), shutdown() on SIGINT/SIGTERM/SIGQUIT
//! ```
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use callvisor::{Campaign, CallTarget, Config, LogWriter, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let campaign = Campaign::builder(Config::default())
//!         .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
//!         .build();
//!
//!     let worklist = campaign.contacts().all_pending(50).await?;
//!     let report = campaign.run_until_signal(worklist).await?;
//!     println!("{report:?}");
//!     campaign.shutdown().await;
//!     Ok(())
//! }
//! ```

mod builder;
mod signal;

pub use builder::CampaignBuilder;
pub use signal::wait_for_shutdown_signal;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{ContactDirectory, PushStream};
use crate::config::Config;
use crate::connection::ConnectionRegistry;
use crate::dispatch::{DispatchEngine, DispatchReport, SessionState};
use crate::error::DispatchError;
use crate::events::{Bus, Event, EventKind};
use crate::model::CallTarget;
use crate::store::CallStatusStore;
use crate::subscribers::SubscriberSet;

/// A wired campaign runtime.
pub struct Campaign {
    cfg: Config,
    bus: Bus,
    store: Arc<CallStatusStore>,
    registry: Arc<ConnectionRegistry>,
    engine: DispatchEngine,
    runtime_token: CancellationToken,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Campaign {
    /// Starts building a campaign.
    pub fn builder(cfg: Config) -> CampaignBuilder {
        CampaignBuilder::new(cfg)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        store: Arc<CallStatusStore>,
        registry: Arc<ConnectionRegistry>,
        engine: DispatchEngine,
        runtime_token: CancellationToken,
        listeners: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            store,
            registry,
            engine,
            runtime_token,
            listeners: Mutex::new(listeners),
        }
    }

    /// Runs one dispatch session over `worklist`.
    pub async fn dispatch(&self, worklist: Vec<CallTarget>) -> Result<DispatchReport, DispatchError> {
        self.engine
            .run(worklist, self.runtime_token.child_token())
            .await
    }

    /// Stops the running session after the current target.
    pub fn cancel(&self) {
        self.engine.cancel();
    }

    /// Cancels the session and closes every status connection.
    pub async fn hard_stop(&self) {
        self.engine.cancel();
        self.registry.disconnect_all().await;
    }

    /// Hard stop, then stops the background listeners.
    ///
    /// Events published before this call still reach the subscribers.
    pub async fn shutdown(&self) {
        self.hard_stop().await;
        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let listeners: Vec<_> = {
            let mut guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.drain(..).collect()
        };
        for h in listeners {
            if let Err(e) = h.await {
                warn!(error = %e, "campaign listener ended abnormally");
            }
        }
    }

    /// Runs a session and shuts down if a termination signal arrives first.
    pub async fn run_until_signal(
        &self,
        worklist: Vec<CallTarget>,
    ) -> Result<DispatchReport, DispatchError> {
        let run = self.dispatch(worklist);
        tokio::pin!(run);

        tokio::select! {
            res = &mut run => res,
            sig = wait_for_shutdown_signal() => {
                if let Err(e) = sig {
                    warn!(error = %e, "signal handlers unavailable; running to completion");
                    return run.await;
                }
                info!("termination signal received");
                self.engine.cancel();
                let res = run.await;
                self.shutdown().await;
                res
            }
        }
    }

    /// Client for the pending-contact listing.
    pub fn contacts(&self) -> ContactDirectory {
        ContactDirectory::new(&self.cfg.api_base)
    }

    /// SSE status channel at `url`, writing into this campaign's store.
    pub fn push_stream(&self, url: impl Into<String>) -> PushStream {
        PushStream::new(url, &self.cfg, Arc::clone(&self.store), self.bus.clone())
    }

    /// Token cancelled by [`shutdown`](Self::shutdown); pass it to a [`PushStream`].
    pub fn runtime_token(&self) -> CancellationToken {
        self.runtime_token.clone()
    }

    /// Subscribes to the raw event bus.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The status store.
    pub fn store(&self) -> &Arc<CallStatusStore> {
        &self.store
    }

    /// The connection registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Current dispatch session state.
    pub fn state(&self) -> SessionState {
        self.engine.state()
    }

    /// The configuration in use.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Forwards bus events to subscribers until `token` is cancelled, then
    /// drains what is left and waits for the subscribers to finish.
    pub(crate) fn spawn_forwarder(
        mut rx: broadcast::Receiver<Event>,
        set: SubscriberSet,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit(&ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
            while let Ok(ev) = rx.try_recv() {
                set.emit(&ev);
            }
            set.shutdown().await;
        })
    }
}
