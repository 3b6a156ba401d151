//! Per-target status connections.
//!
//! - [`transport`] opens connections ([`Connector`], [`WsConnector`])
//! - [`actor`] drives one connection and reports typed events
//! - [`registry`] owns all connections and their reconnect timers

mod actor;
mod registry;
mod transport;

pub use actor::{ConnectionActor, ConnectionEvent, ConnectionEventKind};
pub use registry::ConnectionRegistry;
pub use transport::{Connection, Connector, Inbound, WsConnection, WsConnector};
