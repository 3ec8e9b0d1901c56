use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::Notify;

use tether_cache::{CacheStorage, InMemoryCacheStorage};
use tether_infra::{HttpFetcher, SqliteCacheStorage};
use tether_interceptor::InterceptorService;
use tether_proxy::ProxyConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ProxyConfig::from_env().context("invalid proxy configuration")?;
    tether_observability::init_with(config.log_format);

    let storage: Arc<dyn CacheStorage> = match &config.cache_db {
        Some(path) => {
            tracing::info!("Using SQLite cache storage at {}", path.display());
            Arc::new(
                SqliteCacheStorage::open_path(path)
                    .await
                    .with_context(|| format!("failed to open cache database {}", path.display()))?,
            )
        }
        None => {
            tracing::warn!("TETHER_CACHE_DB not set; caches will not survive a restart");
            Arc::new(InMemoryCacheStorage::new())
        }
    };
    let fetcher = HttpFetcher::with_timeout(Duration::from_secs(30)).context("failed to build HTTP client")?;

    let service = Arc::new(InterceptorService::new(
        config.interceptor_config(),
        Arc::new(fetcher),
        storage,
    ));

    // Without a cached shell, navigations fall back to the built-in page.
    if let Err(e) = service.install().await {
        tracing::error!("Install failed, continuing without a fresh shell: {}", e);
    }
    service.activate().await.context("failed to activate cache generation")?;

    let shutdown = Arc::new(Notify::new());
    let sync_worker = service.spawn_background_sync(config.sync_interval, shutdown.clone());

    let app = tether_proxy::app::build_app(service);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    tracing::info!(
        "listening on {} (upstream {})",
        listener.local_addr()?,
        config.upstream
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("server error")?;

    shutdown.notify_one();
    let _ = sync_worker.await;
    Ok(())
}
