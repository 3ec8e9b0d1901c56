//! Interceptor configuration.

use chrono::Duration;
use url::Url;

use tether_cache::CacheGeneration;
use tether_core::{ActionType, CoreError};
use tether_resilience::RetryConfig;

/// Delivery path for each action type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryEndpoints {
    pub progress: String,
    pub completions: String,
    pub error_reports: String,
    pub telemetry: String,
}

impl Default for DeliveryEndpoints {
    fn default() -> Self {
        Self {
            progress: "/api/progress".to_string(),
            completions: "/api/completions".to_string(),
            error_reports: "/api/error-reports".to_string(),
            telemetry: "/api/telemetry".to_string(),
        }
    }
}

impl DeliveryEndpoints {
    pub fn path_for(&self, action_type: ActionType) -> &str {
        match action_type {
            ActionType::ProgressReport => &self.progress,
            ActionType::CompletionReport => &self.completions,
            ActionType::ErrorReport => &self.error_reports,
            ActionType::TelemetryEvent => &self.telemetry,
        }
    }
}

/// Interceptor configuration.
#[derive(Debug, Clone)]
pub struct InterceptorConfig {
    /// Origin the shell, API and delivery paths are resolved against
    pub origin: Url,
    /// Names the STATIC/API caches
    pub cache_generation: CacheGeneration,
    /// Path prefixes classified as API requests
    pub api_prefixes: Vec<String>,
    /// Shell assets fetched at install
    pub precache_manifest: Vec<String>,
    /// Cached page served when a navigation fails
    pub offline_document: String,
    pub delivery_endpoints: DeliveryEndpoints,
    /// Queued actions older than this are dropped
    pub retention: Duration,
    /// Backoff between delivery attempts of one queued action
    pub retry: RetryConfig,
}

impl InterceptorConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            cache_generation: CacheGeneration::default(),
            api_prefixes: vec!["/api/".to_string()],
            precache_manifest: vec![
                "/".to_string(),
                "/offline.html".to_string(),
                "/manifest.json".to_string(),
            ],
            offline_document: "/offline.html".to_string(),
            delivery_endpoints: DeliveryEndpoints::default(),
            retention: Duration::hours(24),
            retry: RetryConfig::default(),
        }
    }

    /// Parse `origin` and build the default configuration for it.
    pub fn for_origin(origin: &str) -> Result<Self, CoreError> {
        let origin = Url::parse(origin).map_err(|e| CoreError::invalid_url(format!("{origin}: {e}")))?;
        Ok(Self::new(origin))
    }

    pub fn with_cache_version(mut self, version: impl Into<String>) -> Self {
        self.cache_generation.version = version.into();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_generation.prefix = prefix.into();
        self
    }

    pub fn with_api_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_precache_manifest<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.precache_manifest = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offline_document(mut self, path: impl Into<String>) -> Self {
        self.offline_document = path.into();
        self
    }

    pub fn with_delivery_endpoints(mut self, endpoints: DeliveryEndpoints) -> Self {
        self.delivery_endpoints = endpoints;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve a path (or absolute URL) against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url, CoreError> {
        self.origin
            .join(path)
            .map_err(|e| CoreError::invalid_url(format!("{path}: {e}")))
    }

    pub fn is_api_path(&self, path: &str) -> bool {
        self.api_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Cache key of the offline document.
    pub fn offline_document_key(&self) -> Result<String, CoreError> {
        Ok(self.resolve(&self.offline_document)?.to_string())
    }

    pub fn delivery_url(&self, action_type: ActionType) -> Result<Url, CoreError> {
        self.resolve(self.delivery_endpoints.path_for(action_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InterceptorConfig::for_origin("https://app.test").unwrap();
        assert_eq!(config.cache_generation.static_cache_name(), "tether-static-v1");
        assert_eq!(config.retention, Duration::hours(24));
        assert!(config.is_api_path("/api/puzzles/1"));
        assert!(!config.is_api_path("/apiary"));
        assert_eq!(
            config.offline_document_key().unwrap(),
            "https://app.test/offline.html"
        );
    }

    #[test]
    fn delivery_urls_per_action_type() {
        let config = InterceptorConfig::for_origin("https://app.test/").unwrap();
        let urls: Vec<String> = ActionType::ALL
            .into_iter()
            .map(|t| config.delivery_url(t).unwrap().to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://app.test/api/progress",
                "https://app.test/api/completions",
                "https://app.test/api/error-reports",
                "https://app.test/api/telemetry",
            ]
        );
    }

    #[test]
    fn builder_overrides() {
        let config = InterceptorConfig::for_origin("https://app.test")
            .unwrap()
            .with_cache_prefix("puzzles")
            .with_cache_version("v3")
            .with_api_prefixes(["/v2/", "/graphql"]);

        assert_eq!(config.cache_generation.api_cache_name(), "puzzles-api-v3");
        assert!(config.is_api_path("/graphql"));
        assert!(!config.is_api_path("/api/x"));
    }
}
