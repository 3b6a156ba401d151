//! Sequential, cancellable dispatch over a worklist.
//!
//! - [`DispatchEngine`] runs one session at a time
//! - [`DispatchSession`] holds the worklist and its forward-only cursor
//! - [`DispatchReport`] summarises a finished session

mod engine;
mod session;

pub use engine::DispatchEngine;
pub use session::{DispatchReport, DispatchSession, SessionState};
