//! Generation-tagged STATIC/API caches.
//!
//! A generation is `(prefix, version)`. Its two caches are named
//! `{prefix}-static-{version}` and `{prefix}-api-{version}`. Activating a
//! generation deletes every other cache name wholesale.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use tether_core::{FetchRequest, FetchResponse, Fetcher};

use crate::error::CacheResult;
use crate::memory::InMemoryCacheStorage;
use crate::storage::CacheStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Shell and static assets, replaced per generation.
    Static,
    /// Successful API responses, updated on every 2xx.
    Api,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheGeneration {
    pub prefix: String,
    pub version: String,
}

impl CacheGeneration {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }

    pub fn cache_name(&self, kind: CacheKind) -> String {
        let kind = match kind {
            CacheKind::Static => "static",
            CacheKind::Api => "api",
        };
        format!("{}-{}-{}", self.prefix, kind, self.version)
    }

    pub fn static_cache_name(&self) -> String {
        self.cache_name(CacheKind::Static)
    }

    pub fn api_cache_name(&self) -> String {
        self.cache_name(CacheKind::Api)
    }

    /// Whether `name` belongs to this generation.
    pub fn owns(&self, name: &str) -> bool {
        name == self.static_cache_name() || name == self.api_cache_name()
    }
}

impl Default for CacheGeneration {
    fn default() -> Self {
        Self::new("tether", "v1")
    }
}

/// Entry counts and names at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub static_entries: usize,
    pub api_entries: usize,
    pub cache_names: Vec<String>,
}

/// Shared handle over a storage backend, scoped to one generation.
#[derive(Clone)]
pub struct CacheStore {
    storage: Arc<dyn CacheStorage>,
    generation: CacheGeneration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    pub fn new(storage: Arc<dyn CacheStorage>, generation: CacheGeneration) -> Self {
        Self {
            storage,
            generation,
        }
    }

    pub fn in_memory(generation: CacheGeneration) -> Self {
        Self::new(Arc::new(InMemoryCacheStorage::new()), generation)
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    pub fn storage(&self) -> &Arc<dyn CacheStorage> {
        &self.storage
    }

    pub async fn get(&self, kind: CacheKind, key: &str) -> CacheResult<Option<FetchResponse>> {
        self.storage.get(&self.generation.cache_name(kind), key).await
    }

    pub async fn put(&self, kind: CacheKind, key: &str, response: &FetchResponse) -> CacheResult<()> {
        self.storage
            .put(&self.generation.cache_name(kind), key, response)
            .await
    }

    /// All-or-nothing write of several entries.
    pub async fn put_all(&self, kind: CacheKind, entries: &[(String, FetchResponse)]) -> CacheResult<()> {
        self.storage
            .put_all(&self.generation.cache_name(kind), entries)
            .await
    }

    /// Look `key` up in the current STATIC cache, then the current API cache.
    pub async fn lookup(&self, key: &str) -> CacheResult<Option<FetchResponse>> {
        for kind in [CacheKind::Static, CacheKind::Api] {
            if let Some(hit) = self.get(kind, key).await? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }

    pub async fn contains(&self, key: &str) -> CacheResult<bool> {
        Ok(self.lookup(key).await?.is_some())
    }

    /// Make this generation current: create its caches and delete every
    /// cache name it does not own. Returns the deleted names.
    pub async fn activate(&self) -> CacheResult<Vec<String>> {
        self.storage.open(&self.generation.static_cache_name()).await?;
        self.storage.open(&self.generation.api_cache_name()).await?;

        let mut deleted = Vec::new();
        for name in self.storage.cache_names().await? {
            if self.generation.owns(&name) {
                continue;
            }
            if self.storage.delete(&name).await? {
                tracing::info!("Deleted cache {} from previous generation", name);
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    pub async fn snapshot(&self) -> CacheResult<CacheSnapshot> {
        Ok(CacheSnapshot {
            static_entries: self.storage.count(&self.generation.static_cache_name()).await?,
            api_entries: self.storage.count(&self.generation.api_cache_name()).await?,
            cache_names: self.storage.cache_names().await?,
        })
    }

    /// Best-effort: fetch each URL and keep every 2xx in the STATIC cache.
    /// Returns how many URLs were stored. Failures are logged and skipped.
    pub async fn precache<F>(&self, fetcher: &F, urls: &[String]) -> CacheResult<usize>
    where
        F: Fetcher + ?Sized,
    {
        let mut stored = 0;
        for url in urls {
            let request = match FetchRequest::get(url) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Skipping precache of {}: {}", url, e);
                    continue;
                }
            };
            let key = request.cache_key();
            match fetcher.fetch(request).await {
                Ok(response) if response.is_success() => {
                    self.put(CacheKind::Static, &key, &response).await?;
                    stored += 1;
                }
                Ok(response) => {
                    tracing::warn!("Precache of {} returned {}", url, response.status);
                }
                Err(e) => {
                    tracing::warn!("Precache of {} failed: {}", url, e);
                }
            }
        }
        Ok(stored)
    }
}
