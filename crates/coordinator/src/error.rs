use thiserror::Error;

use tether_cache::CacheError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// No active interceptor registration to talk to.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("coordinator already started")]
    AlreadyStarted,

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl CoordinatorError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::CapabilityUnavailable(reason.into())
    }
}
