//! End-to-end offline behavior: coordinator and interceptor wired over an
//! in-process transport, sharing one cache store.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::StatusCode;
use serde_json::json;
use tokio::sync::Notify;

use tether_cache::{CacheKind, InMemoryCacheStorage};
use tether_coordinator::{CoordinatorConfig, OfflineCoordinator, OfflineEvent};
use tether_core::testing::ScriptedFetcher;
use tether_core::{ActionType, ConnectivityEvent, FetchRequest, FetchResponse};
use tether_events::{InProcessTransport, ServiceBroadcast, Subscription, SyncSummary};
use tether_interceptor::{InterceptorConfig, InterceptorService, NoopRegistrar};

const ORIGIN: &str = "https://app.test";

struct World {
    net: Arc<ScriptedFetcher>,
    interceptor: Arc<InterceptorService>,
    coordinator: Arc<OfflineCoordinator>,
}

async fn world() -> World {
    let net = Arc::new(ScriptedFetcher::new());
    net.route_status("https://app.test/", StatusCode::OK);
    net.route_status("https://app.test/api/progress", StatusCode::OK);

    let interceptor = Arc::new(InterceptorService::with_registrar(
        InterceptorConfig::for_origin(ORIGIN).unwrap(),
        net.clone(),
        Arc::new(InMemoryCacheStorage::new()),
        Arc::new(NoopRegistrar),
    ));
    interceptor.activate().await.unwrap();

    let (transport, inbox) = InProcessTransport::channel(32);
    interceptor.spawn(inbox);

    let coordinator = Arc::new(OfflineCoordinator::new(
        CoordinatorConfig::for_origin(ORIGIN).unwrap(),
        Arc::new(transport),
        net.clone(),
        interceptor.store().clone(),
    ));
    coordinator.start(interceptor.subscribe()).await.unwrap();

    World {
        net,
        interceptor,
        coordinator,
    }
}

#[tokio::test]
async fn queued_progress_report_is_delivered_after_reconnect() {
    let w = world().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    w.coordinator.on(move |event| sink.lock().unwrap().push(event.clone()));

    w.net.set_online(false);
    w.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;
    w.coordinator
        .queue_action(ActionType::ProgressReport, json!({"puzzleId": "p1"}))
        .await
        .unwrap();

    let status = w.coordinator.get_cache_status().await.unwrap();
    assert_eq!(status.queue_size, 1);
    assert_eq!(w.coordinator.get_offline_state().queued_action_count, 1);

    let mut broadcasts = w.interceptor.subscribe();
    w.net.set_online(true);
    w.coordinator.handle_platform_event(ConnectivityEvent::Restored).await;

    let message = tokio::time::timeout(Duration::from_secs(5), broadcasts.recv())
        .await
        .unwrap();
    assert_eq!(
        message,
        Some(ServiceBroadcast::SyncComplete(SyncSummary {
            processed_count: 1,
            remaining_count: 0,
        }))
    );
    assert_eq!(
        serde_json::to_value(message.unwrap()).unwrap(),
        json!({"type": "SYNC_COMPLETE", "processedCount": 1, "remainingCount": 0})
    );
    assert_eq!(w.net.call_count("https://app.test/api/progress"), 1);

    let status = w.coordinator.get_cache_status().await.unwrap();
    assert_eq!(status.queue_size, 0);

    // the coordinator's own broadcast listener relays the summary
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let relayed = seen.lock().unwrap().iter().any(|e| {
                matches!(e, OfflineEvent::SyncComplete(s) if s.processed_count == 1)
            });
            if relayed {
                break;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert!(w.coordinator.get_offline_state().last_sync_at.is_some());
}

async fn next_summary_where<F>(broadcasts: &mut Subscription<ServiceBroadcast>, wanted: F) -> SyncSummary
where
    F: Fn(&SyncSummary) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match broadcasts.recv().await {
                Some(ServiceBroadcast::SyncComplete(summary)) if wanted(&summary) => break summary,
                Some(_) => continue,
                None => panic!("broadcast bus closed"),
            }
        }
    })
    .await
    .unwrap()
}

/// Production wiring: enqueues wake the background sync loop, so the action
/// has already failed once and sits in backoff when connectivity returns.
#[tokio::test]
async fn reconnect_delivers_action_already_in_backoff() {
    let net = Arc::new(ScriptedFetcher::new());
    net.route_status("https://app.test/", StatusCode::OK);
    net.route_status("https://app.test/api/progress", StatusCode::OK);

    let interceptor = Arc::new(InterceptorService::new(
        InterceptorConfig::for_origin(ORIGIN).unwrap(),
        net.clone(),
        Arc::new(InMemoryCacheStorage::new()),
    ));
    interceptor.activate().await.unwrap();
    let (transport, inbox) = InProcessTransport::channel(32);
    interceptor.spawn(inbox);
    let shutdown = Arc::new(Notify::new());
    let worker = interceptor.spawn_background_sync(Duration::from_secs(30), shutdown.clone());

    let coordinator = Arc::new(OfflineCoordinator::new(
        CoordinatorConfig::for_origin(ORIGIN).unwrap(),
        Arc::new(transport),
        net.clone(),
        interceptor.store().clone(),
    ));
    coordinator.start(interceptor.subscribe()).await.unwrap();
    let mut broadcasts = interceptor.subscribe();

    net.set_online(false);
    coordinator.handle_platform_event(ConnectivityEvent::Lost).await;
    coordinator
        .queue_action(ActionType::ProgressReport, json!({"puzzleId": "p1"}))
        .await
        .unwrap();

    let failed = next_summary_where(&mut broadcasts, |_| true).await;
    assert_eq!(
        failed,
        SyncSummary {
            processed_count: 0,
            remaining_count: 1,
        }
    );
    assert_eq!(interceptor.queue().snapshot().await[0].attempts, 1);

    net.set_online(true);
    coordinator.handle_platform_event(ConnectivityEvent::Restored).await;

    let delivered = next_summary_where(&mut broadcasts, |s| s.processed_count > 0).await;
    assert_eq!(
        delivered,
        SyncSummary {
            processed_count: 1,
            remaining_count: 0,
        }
    );
    assert!(interceptor.queue().is_empty().await);
    assert_eq!(coordinator.get_cache_status().await.unwrap().queue_size, 0);

    shutdown.notify_one();
    worker.await.unwrap();
    coordinator.shutdown();
}

#[tokio::test]
async fn uncached_api_request_offline_gets_503() {
    let w = world().await;
    w.net.set_online(false);

    let response = w
        .interceptor
        .handle_fetch(FetchRequest::get("https://app.test/api/puzzles/42").unwrap())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.text(),
        r#"{"error":"offline","message":"This content is not available offline","cached":false}"#
    );
    assert_eq!(response.header_str("x-offline"), Some("true"));
}

#[tokio::test]
async fn cached_api_request_offline_is_marked_cached() {
    let w = world().await;
    let cached = FetchResponse::ok().with_json(&json!({"id": 42}));
    w.interceptor
        .store()
        .put(CacheKind::Api, "https://app.test/api/puzzles/42", &cached)
        .await
        .unwrap();
    w.net.set_online(false);

    let response = w
        .interceptor
        .handle_fetch(FetchRequest::get("https://app.test/api/puzzles/42").unwrap())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, cached.body);
    assert_eq!(response.header_str("x-cached"), Some("true"));
}

#[tokio::test]
async fn navigation_offline_without_shell_gets_retry_page() {
    let w = world().await;
    w.net.set_online(false);

    let response = w
        .interceptor
        .handle_fetch(FetchRequest::navigate("https://app.test/puzzles/9").unwrap())
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert!(
        response
            .header_str("content-type")
            .is_some_and(|v| v.starts_with("text/html"))
    );
    let body = response.text();
    assert!(body.contains("<button"));
    assert!(body.contains("location.reload()"));
}

#[tokio::test(start_paused = true)]
async fn cache_status_gives_up_when_interceptor_never_answers() {
    // inbox stays alive but nobody reads it
    let (transport, _inbox) = InProcessTransport::channel(8);
    let interceptor = InterceptorService::with_registrar(
        InterceptorConfig::for_origin(ORIGIN).unwrap(),
        Arc::new(ScriptedFetcher::new()),
        Arc::new(InMemoryCacheStorage::new()),
        Arc::new(NoopRegistrar),
    );
    let coordinator = Arc::new(OfflineCoordinator::new(
        CoordinatorConfig::for_origin(ORIGIN).unwrap(),
        Arc::new(transport),
        Arc::new(ScriptedFetcher::new()),
        interceptor.store().clone(),
    ));
    coordinator.start(interceptor.subscribe()).await.unwrap();

    let started = tokio::time::Instant::now();
    let status = coordinator.get_cache_status().await;
    let waited = started.elapsed();

    assert_eq!(status, None);
    assert!(waited >= Duration::from_secs(5));
    assert!(waited < Duration::from_secs(6));
    assert!(!coordinator.get_offline_state().has_cached_content);
    coordinator.shutdown();
}

#[tokio::test]
async fn precached_content_is_served_offline() {
    let w = world().await;
    w.net.route(
        "https://app.test/puzzles/7.json",
        FetchResponse::ok().with_body("{\"id\":7}"),
    );

    let stored = w
        .coordinator
        .precache_content(&["/puzzles/7.json".to_string()])
        .await
        .unwrap();
    assert_eq!(stored, 1);
    assert!(w.coordinator.is_content_available_offline("/puzzles/7.json").await);

    w.net.set_online(false);
    let response = w
        .interceptor
        .handle_fetch(FetchRequest::get("https://app.test/puzzles/7.json").unwrap())
        .await
        .unwrap();
    assert_eq!(response.text(), "{\"id\":7}");
}
