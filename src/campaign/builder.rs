use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::Campaign;
use crate::adapters::{HttpInitiator, InitiationAdapter};
use crate::config::Config;
use crate::connection::{ConnectionRegistry, Connector, WsConnector};
use crate::dispatch::DispatchEngine;
use crate::events::Bus;
use crate::store::CallStatusStore;
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for a [`Campaign`].
///
/// Collaborators default to the network implementations:
/// [`WsConnector`] on `ws_base` and [`HttpInitiator`] on `api_base`.
pub struct CampaignBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    initiator: Option<Arc<dyn InitiationAdapter>>,
    connector: Option<Arc<dyn Connector>>,
}

impl CampaignBuilder {
    /// Creates a builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            initiator: None,
            connector: None,
        }
    }

    /// Sets event subscribers.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Replaces the initiation service client.
    pub fn with_initiator(mut self, initiator: Arc<dyn InitiationAdapter>) -> Self {
        self.initiator = Some(initiator);
        self
    }

    /// Replaces the status connection transport.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Wires every component and starts the background listeners.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<Campaign> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let runtime_token = CancellationToken::new();
        let store = Arc::new(CallStatusStore::new());

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WsConnector::new(self.cfg.ws_base.as_str())) as Arc<dyn Connector>);
        let initiator = self
            .initiator
            .unwrap_or_else(|| Arc::new(HttpInitiator::new(&self.cfg.api_base)) as Arc<dyn InitiationAdapter>);

        let registry = ConnectionRegistry::new(
            connector,
            self.cfg.connection_policy(),
            Arc::clone(&store),
            bus.clone(),
            runtime_token.clone(),
        );
        let engine = DispatchEngine::new(
            &self.cfg,
            Arc::clone(&registry),
            Arc::clone(&store),
            initiator,
            bus.clone(),
        );

        // Subscribe before anything can publish.
        let forwarder = Campaign::spawn_forwarder(
            bus.subscribe(),
            SubscriberSet::new(self.subscribers, bus.clone()),
            runtime_token.clone(),
        );
        let listener = registry.spawn_listener();

        Arc::new(Campaign::new_internal(
            self.cfg,
            bus,
            store,
            registry,
            engine,
            runtime_token,
            vec![listener, forwarder],
        ))
    }
}
