//! Per-class response strategies.
//!
//! Every strategy ends in a live, cached, or synthesized response. Cache
//! read/write failures are logged and never surface to the caller.

use tether_cache::{CacheKind, CacheStore};
use tether_core::{FetchRequest, FetchResponse, Fetcher};

use crate::config::InterceptorConfig;
use crate::fallback;

/// Network first; cached offline document, then the inline page, on
/// network error. Live responses pass through whatever their status.
pub async fn navigation<F>(
    fetcher: &F,
    store: &CacheStore,
    config: &InterceptorConfig,
    request: FetchRequest,
) -> FetchResponse
where
    F: Fetcher + ?Sized,
{
    let url = request.url.clone();
    match fetcher.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::info!("Navigation to {} failed ({}), serving offline page", url, e);
            match cached_offline_document(store, config).await {
                Some(page) => page,
                None => fallback::offline_navigation_response(),
            }
        }
    }
}

async fn cached_offline_document(store: &CacheStore, config: &InterceptorConfig) -> Option<FetchResponse> {
    let key = match config.offline_document_key() {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!("Offline document path is invalid: {}", e);
            return None;
        }
    };
    match store.get(CacheKind::Static, &key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!("Failed to read offline document from cache: {}", e);
            None
        }
    }
}

/// Network first. A 2xx is cached and returned; anything else (error or
/// non-2xx) falls back to the cached copy marked `X-Cached`, else a 503.
pub async fn api<F>(fetcher: &F, store: &CacheStore, request: FetchRequest) -> FetchResponse
where
    F: Fetcher + ?Sized,
{
    let key = request.cache_key();
    match fetcher.fetch(request).await {
        Ok(response) if response.is_success() => {
            if let Err(e) = store.put(CacheKind::Api, &key, &response).await {
                tracing::warn!("Failed to cache API response for {}: {}", key, e);
            }
            return response;
        }
        Ok(response) => {
            tracing::info!("API request {} returned {}, trying cache", key, response.status);
        }
        Err(e) => {
            tracing::info!("API request {} failed ({}), trying cache", key, e);
        }
    }

    match store.get(CacheKind::Api, &key).await {
        Ok(Some(cached)) => fallback::cached_api_response(cached),
        Ok(None) => fallback::offline_api_response(),
        Err(e) => {
            tracing::warn!("Failed to read API cache for {}: {}", key, e);
            fallback::offline_api_response()
        }
    }
}

/// Cache first. On a miss the network answers; a 2xx is cached, a non-2xx
/// is returned uncached, a network error becomes a 404.
pub async fn static_asset<F>(fetcher: &F, store: &CacheStore, request: FetchRequest) -> FetchResponse
where
    F: Fetcher + ?Sized,
{
    let key = request.cache_key();
    match store.get(CacheKind::Static, &key).await {
        Ok(Some(hit)) => return hit,
        Ok(None) => {}
        Err(e) => tracing::warn!("Failed to read static cache for {}: {}", key, e),
    }

    match fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                if let Err(e) = store.put(CacheKind::Static, &key, &response).await {
                    tracing::warn!("Failed to cache asset {}: {}", key, e);
                }
            }
            response
        }
        Err(e) => {
            tracing::info!("Asset {} unavailable ({}), serving 404", key, e);
            fallback::offline_static_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use proptest::prelude::*;
    use tether_cache::CacheGeneration;
    use tether_core::FetchError;
    use tether_core::testing::ScriptedFetcher;

    fn setup() -> (ScriptedFetcher, CacheStore, InterceptorConfig) {
        (
            ScriptedFetcher::new(),
            CacheStore::in_memory(CacheGeneration::default()),
            InterceptorConfig::for_origin("https://app.test").unwrap(),
        )
    }

    #[tokio::test]
    async fn api_success_is_cached_then_served_offline() {
        let (net, store, _) = setup();
        let url = "https://app.test/api/puzzles/42";
        net.route(url, FetchResponse::ok().with_body(r#"{"id":42}"#));

        let live = api(&net, &store, FetchRequest::get(url).unwrap()).await;
        assert_eq!(live.text(), r#"{"id":42}"#);
        assert!(live.header_str("x-cached").is_none());

        net.set_online(false);
        let offline = api(&net, &store, FetchRequest::get(url).unwrap()).await;
        assert_eq!(offline.status, StatusCode::OK);
        assert_eq!(offline.text(), r#"{"id":42}"#);
        assert_eq!(offline.header_str("x-cached"), Some("true"));
    }

    #[tokio::test]
    async fn api_non_success_is_not_cached_and_falls_back() {
        let (net, store, _) = setup();
        let url = "https://app.test/api/puzzles/7";
        net.route_status(url, StatusCode::INTERNAL_SERVER_ERROR);

        let res = api(&net, &store, FetchRequest::get(url).unwrap()).await;
        assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.header_str("x-offline"), Some("true"));
        assert!(store.get(CacheKind::Api, url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_error_with_stale_copy_serves_copy() {
        let (net, store, _) = setup();
        let url = "https://app.test/api/daily";
        store
            .put(CacheKind::Api, url, &FetchResponse::ok().with_body("yesterday"))
            .await
            .unwrap();
        net.route_status(url, StatusCode::BAD_GATEWAY);

        let res = api(&net, &store, FetchRequest::get(url).unwrap()).await;
        assert_eq!(res.text(), "yesterday");
        assert_eq!(res.header_str("x-cached"), Some("true"));
    }

    #[tokio::test]
    async fn static_is_cache_first() {
        let (net, store, _) = setup();
        let url = "https://app.test/app.js";
        net.route(url, FetchResponse::ok().with_body("v1"));

        assert_eq!(static_asset(&net, &store, FetchRequest::get(url).unwrap()).await.text(), "v1");

        // A changed origin copy is not seen while the cached one exists.
        net.route(url, FetchResponse::ok().with_body("v2"));
        assert_eq!(static_asset(&net, &store, FetchRequest::get(url).unwrap()).await.text(), "v1");
        assert_eq!(net.call_count(url), 1);
    }

    #[tokio::test]
    async fn static_miss_non_success_is_returned_uncached() {
        let (net, store, _) = setup();
        let url = "https://app.test/missing.css";

        let res = static_asset(&net, &store, FetchRequest::get(url).unwrap()).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert!(res.text().is_empty());
        assert!(store.get(CacheKind::Static, url).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_network_error_is_synthesized_404() {
        let (net, store, _) = setup();
        net.route_error("https://app.test/font.woff2", FetchError::Timeout);

        let res = static_asset(&net, &store, FetchRequest::get("https://app.test/font.woff2").unwrap()).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.text(), "Resource not available offline");
    }

    #[tokio::test]
    async fn navigation_prefers_cached_offline_document() {
        let (net, store, config) = setup();
        net.set_online(false);

        let inline = navigation(&net, &store, &config, FetchRequest::navigate("https://app.test/p/1").unwrap()).await;
        assert!(inline.text().contains("location.reload()"));

        store
            .put(
                CacheKind::Static,
                "https://app.test/offline.html",
                &FetchResponse::ok().with_body("<h1>cached offline</h1>"),
            )
            .await
            .unwrap();
        let cached = navigation(&net, &store, &config, FetchRequest::navigate("https://app.test/p/1").unwrap()).await;
        assert_eq!(cached.text(), "<h1>cached offline</h1>");
    }

    #[tokio::test]
    async fn navigation_passes_live_errors_through() {
        let (net, store, config) = setup();
        net.route_status("https://app.test/gone", StatusCode::GONE);

        let res = navigation(&net, &store, &config, FetchRequest::navigate("https://app.test/gone").unwrap()).await;
        assert_eq!(res.status, StatusCode::GONE);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

        #[test]
        fn api_success_never_falls_back(status in 200u16..300, body in "[a-z]{0,16}") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (net, store, _) = setup();
                let url = "https://app.test/api/x";
                let live = FetchResponse::new(StatusCode::from_u16(status).unwrap()).with_body(body.clone());
                net.route(url, live.clone());

                let res = api(&net, &store, FetchRequest::get(url).unwrap()).await;
                assert_eq!(res, live);
                assert_eq!(store.get(CacheKind::Api, url).await.unwrap(), Some(live));
            });
        }

        #[test]
        fn static_success_is_always_cached(path in "/[a-z]{1,8}\\.(js|css|png)") {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let (net, store, _) = setup();
                let url = format!("https://app.test{path}");
                net.route(&url, FetchResponse::ok().with_body("asset"));

                static_asset(&net, &store, FetchRequest::get(&url).unwrap()).await;
                assert!(store.get(CacheKind::Static, &url).await.unwrap().is_some());
            });
        }
    }
}
