//! In-memory cache storage.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

use tether_core::FetchResponse;

use crate::error::CacheResult;
use crate::storage::CacheStorage;

type Entries = BTreeMap<String, FetchResponse>;

/// Process-local cache storage. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryCacheStorage {
    caches: RwLock<BTreeMap<String, Entries>>,
}

impl InMemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CacheStorage for InMemoryCacheStorage {
    async fn open(&self, cache: &str) -> CacheResult<()> {
        self.caches
            .write()
            .await
            .entry(cache.to_string())
            .or_default();
        Ok(())
    }

    async fn has(&self, cache: &str) -> CacheResult<bool> {
        Ok(self.caches.read().await.contains_key(cache))
    }

    async fn delete(&self, cache: &str) -> CacheResult<bool> {
        Ok(self.caches.write().await.remove(cache).is_some())
    }

    async fn cache_names(&self) -> CacheResult<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn put(&self, cache: &str, key: &str, response: &FetchResponse) -> CacheResult<()> {
        self.caches
            .write()
            .await
            .entry(cache.to_string())
            .or_default()
            .insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn put_all(&self, cache: &str, entries: &[(String, FetchResponse)]) -> CacheResult<()> {
        let mut caches = self.caches.write().await;
        let target = caches.entry(cache.to_string()).or_default();
        for (key, response) in entries {
            target.insert(key.clone(), response.clone());
        }
        Ok(())
    }

    async fn get(&self, cache: &str, key: &str) -> CacheResult<Option<FetchResponse>> {
        Ok(self
            .caches
            .read()
            .await
            .get(cache)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn remove(&self, cache: &str, key: &str) -> CacheResult<bool> {
        Ok(self
            .caches
            .write()
            .await
            .get_mut(cache)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn count(&self, cache: &str) -> CacheResult<usize> {
        Ok(self.caches.read().await.get(cache).map(|e| e.len()).unwrap_or(0))
    }

    async fn keys(&self, cache: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .caches
            .read()
            .await
            .get(cache)
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default())
    }
}
