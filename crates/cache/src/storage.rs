//! Storage backend seam.

use std::sync::Arc;

use tether_core::FetchResponse;

use crate::error::CacheResult;

/// Named caches of `key → response`.
///
/// Writes are atomic per key and the last write for a key wins. Every
/// operation on a cache that does not exist behaves as on an empty cache.
#[async_trait::async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist.
    async fn open(&self, cache: &str) -> CacheResult<()>;

    async fn has(&self, cache: &str) -> CacheResult<bool>;

    /// Delete a whole cache. Returns whether it existed.
    async fn delete(&self, cache: &str) -> CacheResult<bool>;

    async fn cache_names(&self) -> CacheResult<Vec<String>>;

    /// Store `response` under `key`, creating the cache if needed.
    async fn put(&self, cache: &str, key: &str, response: &FetchResponse) -> CacheResult<()>;

    /// Store several entries in one step: either all are written or none.
    async fn put_all(&self, cache: &str, entries: &[(String, FetchResponse)]) -> CacheResult<()>;

    async fn get(&self, cache: &str, key: &str) -> CacheResult<Option<FetchResponse>>;

    /// Remove one entry. Returns whether it existed.
    async fn remove(&self, cache: &str, key: &str) -> CacheResult<bool>;

    async fn count(&self, cache: &str) -> CacheResult<usize>;

    async fn keys(&self, cache: &str) -> CacheResult<Vec<String>>;
}

#[async_trait::async_trait]
impl<S> CacheStorage for Arc<S>
where
    S: CacheStorage + ?Sized,
{
    async fn open(&self, cache: &str) -> CacheResult<()> {
        (**self).open(cache).await
    }

    async fn has(&self, cache: &str) -> CacheResult<bool> {
        (**self).has(cache).await
    }

    async fn delete(&self, cache: &str) -> CacheResult<bool> {
        (**self).delete(cache).await
    }

    async fn cache_names(&self) -> CacheResult<Vec<String>> {
        (**self).cache_names().await
    }

    async fn put(&self, cache: &str, key: &str, response: &FetchResponse) -> CacheResult<()> {
        (**self).put(cache, key, response).await
    }

    async fn put_all(&self, cache: &str, entries: &[(String, FetchResponse)]) -> CacheResult<()> {
        (**self).put_all(cache, entries).await
    }

    async fn get(&self, cache: &str, key: &str) -> CacheResult<Option<FetchResponse>> {
        (**self).get(cache, key).await
    }

    async fn remove(&self, cache: &str, key: &str) -> CacheResult<bool> {
        (**self).remove(cache, key).await
    }

    async fn count(&self, cache: &str) -> CacheResult<usize> {
        (**self).count(cache).await
    }

    async fn keys(&self, cache: &str) -> CacheResult<Vec<String>> {
        (**self).keys(cache).await
    }
}
