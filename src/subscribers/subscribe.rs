//! # Subscriber trait.
//!
//! `Subscribe` is the extension point for reacting to campaign events
//! (connection transitions, pushed statuses, dispatch progress). Each
//! subscriber is driven by a dedicated worker fed by a bounded queue owned by
//! the [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they do **not** block the dispatch loop,
//!   the registry, or other subscribers.
//! - On queue overflow the event is **dropped** for that subscriber and a
//!   `SubscriberOverflow` event is published.
//!
//! ## Example
//! ```rust
//! use callvisor::{Event, EventKind, Subscribe};
//!
//! struct Dashboard;
//!
//! #[async_trait::async_trait]
//! impl Subscribe for Dashboard {
//!     async fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::StatusPushed {
//!             // refresh the row for ev.target
//!         }
//!     }
//!     fn name(&self) -> &'static str { "dashboard" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handles a single event.
    async fn on_event(&self, event: &Event);

    /// Name used in logs and overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
