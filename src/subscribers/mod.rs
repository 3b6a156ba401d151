//! # Event subscribers.
//!
//! Everything the campaign publishes on the [`Bus`](crate::events::Bus) is
//! forwarded to a [`SubscriberSet`], which runs each [`Subscribe`]
//! implementation on its own worker.
//!
//! ```text
//! Registry / Engine / PushStream ── publish(Event) ──► Bus
//!                                                      │
//!                                   Campaign listener ─┘
//!                                          │
//!                                   SubscriberSet::emit()
//!                                   ┌──────┼──────────┐
//!                                   ▼      ▼          ▼
//!                               LogWriter  Dashboard  ...
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
