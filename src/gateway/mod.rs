//! The gateway facade tying admission, caching, dispatch, and
//! performance recording together.

mod builder;
mod service;

pub use builder::{MuninBuilder, REDIS_URL_ENV};
pub use service::{AiGateway, Completion};

/// Friendly alias for the gateway; the crate's entry point.
pub type Munin = AiGateway;

impl AiGateway {
    /// Start building a gateway.
    pub fn builder() -> MuninBuilder {
        MuninBuilder::new()
    }
}
