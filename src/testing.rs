//! In-memory collaborators shared by unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::adapters::{InitiationAdapter, InitiationOutcome};
use crate::connection::{Connection, Connector, Inbound};
use crate::error::{ConnectError, InitiationError};
use crate::events::{Event, EventKind};
use crate::model::{CallTarget, TargetId};
use crate::policies::CloseCode;

/// Waits (up to a minute of clock time) for the next event of `kind`.
pub async fn wait_for(rx: &mut broadcast::Receiver<Event>, kind: EventKind) -> Event {
    let found = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("bus closed waiting for {kind:?}"),
            }
        }
    })
    .await;
    match found {
        Ok(ev) => ev,
        Err(_) => panic!("no {kind:?} event"),
    }
}

// ---------------------------
// Connector
// ---------------------------

#[derive(Default)]
struct Wires {
    opens: HashMap<TargetId, usize>,
    fail_opens: HashMap<TargetId, usize>,
    links: HashMap<TargetId, mpsc::UnboundedSender<Inbound>>,
    closes: HashMap<TargetId, Vec<CloseCode>>,
}

/// Connector whose connections are driven by the test.
#[derive(Clone, Default)]
pub struct FakeConnector {
    wires: Arc<Mutex<Wires>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` opens for `id` fail.
    pub fn fail_opens(&self, id: &TargetId, n: usize) {
        self.wires.lock().unwrap().fail_opens.insert(id.clone(), n);
    }

    /// Delivers a text frame on the latest connection for `id`.
    pub fn push(&self, id: &TargetId, raw: &str) {
        self.send(id, Inbound::Text(raw.to_string()));
    }

    /// Makes the latest connection for `id` report a close.
    pub fn drop_with(&self, id: &TargetId, code: CloseCode) {
        self.send(id, Inbound::Closed(code));
    }

    pub fn open_count(&self, id: &TargetId) -> usize {
        self.wires.lock().unwrap().opens.get(id).copied().unwrap_or(0)
    }

    /// Close codes sent by the client side for `id`.
    pub fn closes(&self, id: &TargetId) -> Vec<CloseCode> {
        self.wires
            .lock()
            .unwrap()
            .closes
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    fn send(&self, id: &TargetId, inbound: Inbound) {
        let wires = self.wires.lock().unwrap();
        let link = wires.links.get(id).expect("no connection for target");
        let _ = link.send(inbound);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, target: &CallTarget) -> Result<Box<dyn Connection>, ConnectError> {
        let mut wires = self.wires.lock().unwrap();
        *wires.opens.entry(target.id.clone()).or_default() += 1;

        if let Some(left) = wires.fail_opens.get_mut(&target.id) {
            if *left > 0 {
                *left -= 1;
                return Err(ConnectError::Open("refused".into()));
            }
        }
        let (tx, rx) = mpsc::unbounded_channel();
        wires.links.insert(target.id.clone(), tx);
        Ok(Box::new(FakeConnection {
            id: target.id.clone(),
            rx,
            wires: Arc::clone(&self.wires),
        }))
    }
}

struct FakeConnection {
    id: TargetId,
    rx: mpsc::UnboundedReceiver<Inbound>,
    wires: Arc<Mutex<Wires>>,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn next(&mut self) -> Inbound {
        self.rx
            .recv()
            .await
            .unwrap_or(Inbound::Closed(CloseCode::ABNORMAL))
    }

    async fn close(&mut self, code: CloseCode) {
        self.wires
            .lock()
            .unwrap()
            .closes
            .entry(self.id.clone())
            .or_default()
            .push(code);
    }
}

// ---------------------------
// Initiator
// ---------------------------

/// Scripted reply for one phone number.
#[derive(Clone)]
pub enum Reply {
    Accept(&'static str),
    Refuse(&'static str),
    Unreachable,
    /// Never answers.
    Hang,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, Reply>,
    calls: Vec<(String, Instant)>,
    cancel_on: HashMap<String, CancellationToken>,
    latency: Duration,
}

/// Initiation adapter with per-number scripted replies.
#[derive(Clone, Default)]
pub struct FakeInitiator {
    script: Arc<Mutex<Script>>,
}

impl FakeInitiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, phone: &str, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(phone.to_string(), reply);
        self
    }

    /// Cancels `token` while the call for `phone` is in flight.
    pub fn cancel_during(self, phone: &str, token: CancellationToken) -> Self {
        self.script
            .lock()
            .unwrap()
            .cancel_on
            .insert(phone.to_string(), token);
        self
    }

    /// Delay before every reply.
    pub fn latency(self, latency: Duration) -> Self {
        self.script.lock().unwrap().latency = latency;
        self
    }

    /// Phone numbers in call order.
    pub fn calls(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }

    /// Instants at which each call started.
    pub fn started_at(&self) -> Vec<Instant> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl InitiationAdapter for FakeInitiator {
    async fn initiate(&self, phone_number: &str) -> Result<InitiationOutcome, InitiationError> {
        let (reply, latency) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push((phone_number.to_string(), Instant::now()));
            if let Some(token) = script.cancel_on.get(phone_number) {
                token.cancel();
            }
            let reply = script
                .replies
                .get(phone_number)
                .cloned()
                .unwrap_or(Reply::Accept("CA0"));
            (reply, script.latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match reply {
            Reply::Accept(id) => Ok(InitiationOutcome::accepted(id)),
            Reply::Refuse(msg) => Ok(InitiationOutcome::refused(msg)),
            Reply::Unreachable => Err(InitiationError::Transport("connection refused".into())),
            Reply::Hang => std::future::pending().await,
        }
    }
}
