//! Process configuration from `TETHER_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use tether_interceptor::InterceptorConfig;
use tether_observability::LogFormat;

const DEFAULT_UPSTREAM: &str = "http://localhost:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            var,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Origin every intercepted request is forwarded to
    pub upstream: Url,
    pub listen_addr: SocketAddr,
    /// SQLite file for the caches; in-memory when `None`
    pub cache_db: Option<PathBuf>,
    pub cache_version: Option<String>,
    pub api_prefixes: Option<Vec<String>>,
    pub sync_interval: Duration,
    pub log_format: LogFormat,
}

impl ProxyConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raw = get("TETHER_UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM.to_string());
        let upstream = Url::parse(raw.trim()).map_err(|e| ConfigError::invalid("TETHER_UPSTREAM_URL", e))?;
        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "TETHER_UPSTREAM_URL",
                format!("unsupported scheme '{}'", upstream.scheme()),
            ));
        }

        let mut config = Self {
            upstream,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            cache_db: None,
            cache_version: None,
            api_prefixes: None,
            sync_interval: Duration::from_secs(30),
            log_format: LogFormat::Json,
        };
        if let Some(raw) = get("TETHER_LISTEN_ADDR") {
            config.listen_addr = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("TETHER_LISTEN_ADDR", e))?;
        }
        config.cache_db = get("TETHER_CACHE_DB").map(PathBuf::from);
        config.cache_version = get("TETHER_CACHE_VERSION").map(|v| v.trim().to_string());
        if let Some(raw) = get("TETHER_API_PREFIXES") {
            let prefixes: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
            if let Some(bad) = prefixes.iter().find(|p| !p.starts_with('/')) {
                return Err(ConfigError::invalid(
                    "TETHER_API_PREFIXES",
                    format!("prefix '{bad}' must start with '/'"),
                ));
            }
            config.api_prefixes = Some(prefixes);
        }
        if let Some(raw) = get("TETHER_SYNC_INTERVAL_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid("TETHER_SYNC_INTERVAL_SECS", e))?;
            if secs == 0 {
                return Err(ConfigError::invalid("TETHER_SYNC_INTERVAL_SECS", "must be positive"));
            }
            config.sync_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = get("TETHER_LOG_FORMAT") {
            config.log_format = raw.parse().map_err(|e| ConfigError::invalid("TETHER_LOG_FORMAT", e))?;
        }

        Ok(config)
    }

    /// Interceptor settings for this upstream.
    pub fn interceptor_config(&self) -> InterceptorConfig {
        let mut config = InterceptorConfig::new(self.upstream.clone());
        if let Some(version) = &self.cache_version {
            config = config.with_cache_version(version.clone());
        }
        if let Some(prefixes) = &self.api_prefixes {
            config = config.with_api_prefixes(prefixes.iter().cloned());
        }
        config
    }
}
