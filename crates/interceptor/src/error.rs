use thiserror::Error;

use tether_cache::CacheError;
use tether_core::CoreError;

/// Why an install did not complete. Nothing is written to the cache when
/// install fails.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    InvalidUrl(#[from] CoreError),

    #[error("failed to fetch shell asset {url}: {reason}")]
    AssetFailed { url: String, reason: String },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
