//! Retry with capped exponential backoff.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,
    /// Delay cap
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry `attempt` (1-indexed):
    /// `min(initial_delay * multiplier^(attempt-1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let initial_ms = self.initial_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = self.backoff_multiplier.max(1.0).powi((attempt - 1).min(i32::MAX as u32) as i32);
        let delay_ms = (initial_ms * exp).min(max_ms);

        if delay_ms.is_finite() {
            Duration::from_millis(delay_ms.max(0.0) as u64)
        } else {
            self.max_delay
        }
    }

    /// Check if another retry is allowed after `retries_so_far`.
    pub fn should_retry(&self, retries_so_far: u32) -> bool {
        retries_so_far < self.max_retries
    }
}

/// Run `operation` until it succeeds or the retry budget is spent.
/// Returns the last error on exhaustion.
pub async fn retry_with_backoff<T, E, F, Fut>(operation: F, config: &RetryConfig) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_with_backoff_when(operation, config, |_| true).await
}

/// Like [`retry_with_backoff`], but stops as soon as `should_retry` rejects
/// an error.
pub async fn retry_with_backoff_when<T, E, F, Fut, P>(
    mut operation: F,
    config: &RetryConfig,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut retries = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if retries > 0 {
                    tracing::debug!("Operation succeeded after {} retries", retries);
                }
                return Ok(value);
            }
            Err(e) => {
                if !config.should_retry(retries) || !should_retry(&e) {
                    tracing::debug!("Giving up after {} retries: {}", retries, e);
                    return Err(e);
                }
                retries += 1;
                let delay = config.delay_for_attempt(retries);
                tracing::debug!(
                    "Attempt failed ({}), retry {} of {} in {:?}",
                    e,
                    retries,
                    config.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
