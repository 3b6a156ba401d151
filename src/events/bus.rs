//! # Notification bus for campaign events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]. It is the
//! notifier every component is handed at construction: the connection
//! registry, the dispatch engine and the push stream publish to it, and the
//! campaign's subscriber listener fans events out to user subscribers.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Receivers:
//!   ConnectionRegistry ──┐
//!   DispatchEngine     ──┼──► Bus ──┬──► subscriber listener ──► SubscriberSet
//!   PushStream         ──┘          └──► tests / ad-hoc observers (Bus::subscribe)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on receivers.
//! - **Bounded capacity**: slow receivers observe `RecvError::Lagged(n)`.
//! - **No persistence**: events published with no receiver attached are lost.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for campaign events.
///
/// Cheap to clone; all clones publish into the same ring buffer.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Number of attached receivers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
