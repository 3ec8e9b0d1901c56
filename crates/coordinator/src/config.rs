use std::time::Duration;

use url::Url;

use tether_core::CoreError;

/// Shortest probe period; zero would spin.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Same-origin URL probed with `HEAD` to detect connectivity
    pub probe_url: Url,
    pub probe_interval: Duration,
    /// Upper bound on a cache status round trip
    pub status_timeout: Duration,
}

impl CoordinatorConfig {
    pub fn new(probe_url: Url) -> Self {
        Self {
            probe_url,
            probe_interval: Duration::from_secs(30),
            status_timeout: Duration::from_secs(5),
        }
    }

    /// Probe `/` on `origin`.
    pub fn for_origin(origin: &str) -> Result<Self, CoreError> {
        let probe_url = Url::parse(origin)
            .and_then(|o| o.join("/"))
            .map_err(|e| CoreError::invalid_url(format!("{origin}: {e}")))?;
        Ok(Self::new(probe_url))
    }

    pub fn with_probe_url(mut self, url: Url) -> Self {
        self.probe_url = url;
        self
    }

    /// Clamped to [`MIN_PROBE_INTERVAL`].
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_PROBE_INTERVAL {
            tracing::warn!(
                "Probe interval {:?} too short, using {:?}",
                interval,
                MIN_PROBE_INTERVAL
            );
        }
        self.probe_interval = interval.max(MIN_PROBE_INTERVAL);
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }
}
