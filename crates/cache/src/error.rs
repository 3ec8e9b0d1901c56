use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The backend failed to read or write.
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A stored entry could not be decoded.
    #[error("corrupt cache entry {key} in {cache}: {reason}")]
    Corrupt {
        cache: String,
        key: String,
        reason: String,
    },
}

impl CacheError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
