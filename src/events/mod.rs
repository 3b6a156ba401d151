//! Campaign events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** that acts as
//! the notifier of the runtime.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ConnectionRegistry` (connection lifecycle, pushed statuses),
//!   `DispatchEngine` (session and initiation results), `PushStream`,
//!   `SubscriberSet` workers (overflow/panic), `Campaign` (shutdown).
//! - **Consumers**: the campaign's subscriber listener (fans out to
//!   `SubscriberSet`), plus any caller holding a `Bus::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
