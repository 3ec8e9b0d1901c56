//! `tether-resilience` — failure classification and retry with backoff.
//!
//! Shared by the sync coordinator (backoff for queued actions) and by any
//! caller that wants `retry_with_backoff` around a fallible async operation.

pub mod classify;
pub mod retry;

pub use classify::{ClassifiedError, ErrorCategory, ErrorClassifier, Severity};
pub use retry::{RetryConfig, retry_with_backoff, retry_with_backoff_when};
