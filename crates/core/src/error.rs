//! Core error model.

use thiserror::Error;

/// Result type used by the core primitives.
pub type CoreResult<T> = Result<T, CoreError>;

/// Error raised while building or parsing core values.
///
/// Network and HTTP failures are not represented here; they are modelled by
/// [`crate::fetch::FetchError`] and always recovered by the interceptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A URL could not be parsed or is not usable for a request.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// A request body could not be serialized.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// An unknown action type string was supplied.
    #[error("unknown action type: {0}")]
    UnknownActionType(String),
}

impl CoreError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_url(msg: impl Into<String>) -> Self {
        Self::InvalidUrl(msg.into())
    }
}
