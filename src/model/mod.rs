//! # Campaign data model.
//!
//! Plain data, no behaviour beyond validation and wire decoding:
//! - [`TargetId`] newtype key used by every per-target map
//! - [`CallTarget`] one contact to call
//! - [`StatusKind`] lifecycle state of one call attempt
//! - [`StatusRecord`] latest observed state of one target
//! - [`PushMessage`] JSON frame pushed over a target's status connection

mod status;
mod target;

pub use status::{PushMessage, StatusKind, StatusRecord};
pub use target::{CallTarget, TargetId};
