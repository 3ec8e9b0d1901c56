//! Scripted network fake for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! dev-dependencies of downstream crates.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use http::{Method, StatusCode};

use crate::fetch::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// Fake network: per-URL scripted responses plus an online/offline switch.
///
/// - Offline: every fetch fails with `FetchError::Network`.
/// - Online, routed URL: the scripted response (any method).
/// - Online, unrouted URL: a bare 404.
#[derive(Debug)]
pub struct ScriptedFetcher {
    online: AtomicBool,
    routes: Mutex<HashMap<String, Result<FetchResponse, FetchError>>>,
    calls: Mutex<Vec<(Method, String)>>,
}

impl Default for ScriptedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Script a response for `url` (normalized through `url::Url`).
    pub fn route(&self, url: &str, response: FetchResponse) {
        self.insert(url, Ok(response));
    }

    /// Script a bare status for `url`.
    pub fn route_status(&self, url: &str, status: StatusCode) {
        self.route(url, FetchResponse::new(status));
    }

    /// Script a hard failure for `url` even while online.
    pub fn route_error(&self, url: &str, error: FetchError) {
        self.insert(url, Err(error));
    }

    fn insert(&self, url: &str, outcome: Result<FetchResponse, FetchError>) {
        let key = normalize(url);
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(key, outcome);
        }
    }

    /// Every request seen so far, as `(method, url)`.
    pub fn calls(&self) -> Vec<(Method, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of requests seen for `url` (any method).
    pub fn call_count(&self, url: &str) -> usize {
        let key = normalize(url);
        self.calls().iter().filter(|(_, u)| *u == key).count()
    }
}

fn normalize(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let key = request.url.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((request.method.clone(), key.clone()));
        }

        if !self.is_online() {
            return Err(FetchError::Network("offline".to_string()));
        }

        let routes = self
            .routes
            .lock()
            .map_err(|_| FetchError::Network("scripted fetcher poisoned".to_string()))?;
        match routes.get(&key) {
            Some(outcome) => outcome.clone(),
            None => Ok(FetchResponse::new(StatusCode::NOT_FOUND)),
        }
    }
}
