//! External collaborators reached over HTTP.
//!
//! - [`initiation`]: places outbound calls ([`InitiationAdapter`], [`HttpInitiator`])
//! - [`contacts`]: lists contacts still waiting for a call ([`ContactDirectory`])
//! - [`push_stream`]: SSE status channel with bounded retry ([`PushStream`])

pub mod contacts;
pub mod initiation;
pub mod push_stream;

pub use contacts::{Contact, ContactDirectory, ContactPage};
pub use initiation::{HttpInitiator, InitiationAdapter, InitiationOutcome};
pub use push_stream::{PushStream, PushStreamEnd};
