//! Install and activate.

use tether_cache::{CacheError, CacheKind, CacheStore};
use tether_core::{FetchRequest, FetchResponse, Fetcher};

use crate::config::InterceptorConfig;
use crate::error::InstallError;

/// Fetch every shell asset and write them to the STATIC cache in one step.
///
/// All-or-nothing: if any asset fails (network error or non-2xx) nothing is
/// written and the error names the first failing asset.
pub async fn install<F>(fetcher: &F, store: &CacheStore, config: &InterceptorConfig) -> Result<usize, InstallError>
where
    F: Fetcher + ?Sized,
{
    let mut entries: Vec<(String, FetchResponse)> = Vec::with_capacity(config.precache_manifest.len());

    for path in &config.precache_manifest {
        let url = config.resolve(path)?;
        let request = FetchRequest::new(http::Method::GET, url);
        let key = request.cache_key();

        let response = fetcher.fetch(request).await.map_err(|e| InstallError::AssetFailed {
            url: key.clone(),
            reason: e.to_string(),
        })?;
        if !response.is_success() {
            return Err(InstallError::AssetFailed {
                url: key,
                reason: format!("HTTP {}", response.status),
            });
        }
        entries.push((key, response));
    }

    store.put_all(CacheKind::Static, &entries).await?;
    tracing::info!(
        "Installed {} shell assets into {}",
        entries.len(),
        store.generation().static_cache_name()
    );
    Ok(entries.len())
}

/// Make the configured generation current, deleting every other cache.
pub async fn activate(store: &CacheStore) -> Result<Vec<String>, CacheError> {
    let deleted = store.activate().await?;
    tracing::info!(
        "Activated cache generation {} ({} old caches deleted)",
        store.generation().version,
        deleted.len()
    );
    Ok(deleted)
}
