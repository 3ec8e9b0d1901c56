//! The offline coordinator.
//!
//! Single source of truth for connectivity in the presentation context.
//! Talks to the interceptor only through its [`Transport`]; reads and writes
//! the caches directly through a shared [`CacheStore`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::task::JoinHandle;
use url::Url;

use tether_cache::CacheStore;
use tether_core::{ActionType, ConnectivityEvent, ConnectivityState, Fetcher, OfflineState};
use tether_events::{CacheStatus, InterceptorClient, ServiceBroadcast, Subscription, Transport};

use crate::config::{CoordinatorConfig, MIN_PROBE_INTERVAL};
use crate::error::CoordinatorError;
use crate::events::{ListenerId, Listeners, OfflineEvent};
use crate::probe::probe;
use crate::state::LifecycleState;

#[derive(Debug)]
struct CoordinatorState {
    lifecycle: LifecycleState,
    connectivity: ConnectivityState,
    offline_mode: bool,
    last_status: Option<CacheStatus>,
    last_sync_at: Option<DateTime<Utc>>,
}

pub struct OfflineCoordinator {
    config: CoordinatorConfig,
    client: InterceptorClient<Arc<dyn Transport>>,
    fetcher: Arc<dyn Fetcher>,
    store: CacheStore,
    state: Mutex<CoordinatorState>,
    listeners: Listeners,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for OfflineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineCoordinator")
            .field("config", &self.config)
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

impl OfflineCoordinator {
    /// A coordinator that assumes it starts online.
    pub fn new(
        config: CoordinatorConfig,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn Fetcher>,
        store: CacheStore,
    ) -> Self {
        Self {
            config,
            client: InterceptorClient::new(transport),
            fetcher,
            store,
            state: Mutex::new(CoordinatorState {
                lifecycle: LifecycleState::Uninitialized,
                connectivity: ConnectivityState::online(Utc::now()),
                offline_mode: false,
                last_status: None,
                last_sync_at: None,
            }),
            listeners: Listeners::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.state().lifecycle
    }

    pub fn is_online(&self) -> bool {
        self.state().connectivity.is_online
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.state().connectivity
    }

    /// Register with the interceptor and start the background tasks.
    ///
    /// `broadcasts` delivers the interceptor's `SYNC_COMPLETE` messages. On a
    /// failed registration the coordinator returns to `Uninitialized`.
    pub async fn start(self: &Arc<Self>, broadcasts: Subscription<ServiceBroadcast>) -> Result<(), CoordinatorError> {
        {
            let mut state = self.state();
            if state.lifecycle != LifecycleState::Uninitialized {
                return Err(CoordinatorError::AlreadyStarted);
            }
            state.lifecycle = LifecycleState::Registering;
        }

        if !self.client.is_connected() {
            self.state().lifecycle = LifecycleState::Uninitialized;
            tracing::warn!("Offline coordinator could not register: interceptor unreachable");
            return Err(CoordinatorError::unavailable("interceptor transport is closed"));
        }

        self.state().lifecycle = LifecycleState::Ready;
        tracing::info!("Offline coordinator ready");

        let handles = vec![
            self.spawn_broadcast_listener(broadcasts),
            self.spawn_probe_loop(),
            {
                let coordinator = self.clone();
                tokio::spawn(async move {
                    coordinator.get_cache_status().await;
                })
            },
        ];
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(handles);
        Ok(())
    }

    /// Stop the probe and broadcast tasks.
    pub fn shutdown(&self) {
        let handles: Vec<_> = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            handle.abort();
        }
        tracing::info!("Offline coordinator stopped");
    }

    fn spawn_broadcast_listener(self: &Arc<Self>, mut broadcasts: Subscription<ServiceBroadcast>) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(message) = broadcasts.recv().await {
                match message {
                    ServiceBroadcast::SyncComplete(summary) => {
                        {
                            let mut state = coordinator.state();
                            state.last_sync_at = Some(Utc::now());
                            if let Some(status) = state.last_status.as_mut() {
                                status.queue_size = summary.remaining_count;
                            }
                        }
                        coordinator.listeners.emit(&OfflineEvent::SyncComplete(summary));
                    }
                }
            }
            tracing::debug!("Interceptor broadcast stream ended");
        })
    }

    fn spawn_probe_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = self.clone();
        let period = self.config.probe_interval.max(MIN_PROBE_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                coordinator.probe_once().await;
            }
        })
    }

    /// Probe once and apply the result. Returns the probed reachability.
    pub async fn probe_once(&self) -> bool {
        let online = probe(self.fetcher.as_ref(), &self.config.probe_url).await;
        let event = if online {
            ConnectivityEvent::Restored
        } else {
            ConnectivityEvent::Lost
        };
        self.apply_connectivity(event, "probe").await;
        online
    }

    /// Platform connectivity signal. Ignored until the coordinator is ready.
    pub async fn handle_platform_event(&self, event: ConnectivityEvent) {
        self.apply_connectivity(event, "platform").await;
    }

    async fn apply_connectivity(&self, event: ConnectivityEvent, source: &str) {
        let transitioned = {
            let mut state = self.state();
            if !state.lifecycle.is_ready() {
                tracing::debug!("Ignoring {:?} ({}) before the coordinator is ready", event, source);
                return;
            }
            state.connectivity.apply(event, Utc::now())
        };
        if !transitioned {
            return;
        }

        match event {
            ConnectivityEvent::Restored => {
                tracing::info!("Connectivity restored ({})", source);
                self.listeners.emit(&OfflineEvent::Online);
                if let Err(e) = self.client.trigger_sync().await {
                    tracing::warn!("Failed to request sync after reconnect: {}", e);
                }
            }
            ConnectivityEvent::Lost => {
                tracing::info!("Connectivity lost ({})", source);
                self.listeners.emit(&OfflineEvent::Offline);
            }
        }
    }

    /// Hand a write action to the interceptor's queue.
    pub async fn queue_action(&self, action_type: ActionType, payload: Value) -> Result<(), CoordinatorError> {
        if !self.lifecycle().is_ready() {
            return Err(CoordinatorError::unavailable("coordinator is not registered"));
        }
        if !self.client.is_connected() {
            return Err(CoordinatorError::unavailable("interceptor transport is closed"));
        }

        self.client
            .queue_action(action_type, payload)
            .await
            .map_err(|e| CoordinatorError::unavailable(e.to_string()))?;

        if let Some(status) = self.state().last_status.as_mut() {
            status.queue_size += 1;
        }
        self.listeners.emit(&OfflineEvent::ActionQueued { action_type });
        Ok(())
    }

    /// Ask the interceptor for cache and queue sizes.
    ///
    /// `None` means "status unknown": the interceptor did not answer within
    /// the status timeout or is gone.
    pub async fn get_cache_status(&self) -> Option<CacheStatus> {
        match tokio::time::timeout(self.config.status_timeout, self.client.cache_status()).await {
            Ok(Ok(status)) => {
                self.state().last_status = Some(status.clone());
                Some(status)
            }
            Ok(Err(e)) => {
                tracing::warn!("Cache status unavailable: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Cache status request timed out after {:?}",
                    self.config.status_timeout
                );
                None
            }
        }
    }

    /// Current offline view, from local state and the last known cache status.
    pub fn get_offline_state(&self) -> OfflineState {
        let state = self.state();
        OfflineState {
            is_online: state.connectivity.is_online,
            is_offline_mode_manually_enabled: state.offline_mode,
            has_cached_content: state
                .last_status
                .as_ref()
                .is_some_and(CacheStatus::has_cached_content),
            queued_action_count: state.last_status.as_ref().map_or(0, |s| s.queue_size),
            last_sync_at: state.last_sync_at,
        }
    }

    /// Fetch `urls` into the STATIC cache. Returns how many were stored.
    ///
    /// Relative URLs resolve against the probe origin.
    pub async fn precache_content(&self, urls: &[String]) -> Result<usize, CoordinatorError> {
        let resolved: Vec<String> = urls
            .iter()
            .map(|url| match self.resolve(url) {
                Ok(absolute) => absolute.to_string(),
                Err(_) => url.clone(),
            })
            .collect();
        let stored = self.store.precache(self.fetcher.as_ref(), &resolved).await?;
        tracing::info!("Precached {} of {} URLs", stored, urls.len());
        if let Some(status) = self.state().last_status.as_mut() {
            status.static_cache_size += stored;
        }
        self.listeners.emit(&OfflineEvent::CacheUpdated { stored });
        Ok(stored)
    }

    /// Whether `url` (absolute, or relative to the probe origin) has a cached
    /// copy in the current generation.
    pub async fn is_content_available_offline(&self, url: &str) -> bool {
        let key = match self.resolve(url) {
            Ok(key) => key.to_string(),
            Err(e) => {
                tracing::debug!("Cannot check offline availability of {}: {}", url, e);
                return false;
            }
        };
        match self.store.contains(&key).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Cache lookup for {} failed: {}", key, e);
                false
            }
        }
    }

    fn resolve(&self, url: &str) -> Result<Url, url::ParseError> {
        Url::parse(url).or_else(|_| self.config.probe_url.join(url))
    }

    pub fn enable_offline_mode(&self) {
        if self.set_offline_mode(true) {
            self.listeners.emit(&OfflineEvent::OfflineModeEnabled);
        }
    }

    pub fn disable_offline_mode(&self) {
        if self.set_offline_mode(false) {
            self.listeners.emit(&OfflineEvent::OfflineModeDisabled);
        }
    }

    fn set_offline_mode(&self, enabled: bool) -> bool {
        let mut state = self.state();
        let changed = state.offline_mode != enabled;
        state.offline_mode = enabled;
        changed
    }

    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&OfflineEvent) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use std::time::Duration;
    use tether_cache::InMemoryCacheStorage;
    use tether_core::FetchResponse;
    use tether_core::testing::ScriptedFetcher;
    use tether_events::InProcessTransport;
    use tether_interceptor::{InterceptorConfig, InterceptorService};

    struct Harness {
        net: Arc<ScriptedFetcher>,
        interceptor: Arc<InterceptorService>,
        coordinator: Arc<OfflineCoordinator>,
        events: Arc<Mutex<Vec<OfflineEvent>>>,
    }

    async fn harness() -> Harness {
        let net = Arc::new(ScriptedFetcher::new());
        net.route_status("https://app.test/", StatusCode::OK);
        net.route_status("https://app.test/api/progress", StatusCode::OK);

        let interceptor = Arc::new(InterceptorService::with_registrar(
            InterceptorConfig::for_origin("https://app.test").unwrap(),
            net.clone(),
            Arc::new(InMemoryCacheStorage::new()),
            Arc::new(tether_interceptor::NoopRegistrar),
        ));
        let (transport, inbox) = InProcessTransport::channel(16);
        interceptor.spawn(inbox);

        let coordinator = Arc::new(OfflineCoordinator::new(
            CoordinatorConfig::for_origin("https://app.test").unwrap(),
            Arc::new(transport),
            net.clone(),
            interceptor.store().clone(),
        ));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        coordinator.on(move |e| sink.lock().unwrap().push(e.clone()));

        Harness {
            net,
            interceptor,
            coordinator,
            events,
        }
    }

    #[tokio::test]
    async fn queue_action_requires_registration() {
        let h = harness().await;
        let err = h
            .coordinator
            .queue_action(ActionType::ProgressReport, serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::CapabilityUnavailable(_)));

        h.coordinator.start(h.interceptor.subscribe()).await.unwrap();
        assert_eq!(h.coordinator.lifecycle(), LifecycleState::Ready);
        h.coordinator
            .queue_action(ActionType::ProgressReport, serde_json::json!({}))
            .await
            .unwrap();
        assert!(matches!(
            h.coordinator.start(h.interceptor.subscribe()).await,
            Err(CoordinatorError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn start_fails_on_closed_transport() {
        let (transport, inbox) = InProcessTransport::channel(1);
        drop(inbox);
        let bus: tether_events::InMemoryEventBus<ServiceBroadcast> = tether_events::InMemoryEventBus::new();
        let coordinator = Arc::new(OfflineCoordinator::new(
            CoordinatorConfig::for_origin("https://app.test").unwrap(),
            Arc::new(transport),
            Arc::new(ScriptedFetcher::new()),
            CacheStore::in_memory(Default::default()),
        ));

        let err = coordinator
            .start(tether_events::EventBus::subscribe(&bus))
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::CapabilityUnavailable(_)));
        assert_eq!(coordinator.lifecycle(), LifecycleState::Uninitialized);
    }

    #[tokio::test]
    async fn transitions_emit_once_and_reconnect_triggers_sync() {
        let h = harness().await;
        h.coordinator.start(h.interceptor.subscribe()).await.unwrap();

        h.net.set_online(false);
        h.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;
        h.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;
        h.coordinator
            .queue_action(ActionType::ProgressReport, serde_json::json!({"puzzleId": "p1"}))
            .await
            .unwrap();

        let mut sub = h.interceptor.subscribe();
        h.net.set_online(true);
        h.coordinator.handle_platform_event(ConnectivityEvent::Restored).await;

        let summary = tokio::time::timeout(Duration::from_secs(5), sub.recv()).await.unwrap();
        assert_eq!(
            summary,
            Some(ServiceBroadcast::SyncComplete(tether_events::SyncSummary {
                processed_count: 1,
                remaining_count: 0
            }))
        );

        let events = h.events.lock().unwrap().clone();
        assert_eq!(events.iter().filter(|e| **e == OfflineEvent::Offline).count(), 1);
        assert!(events.contains(&OfflineEvent::Online));
        assert!(events.contains(&OfflineEvent::ActionQueued {
            action_type: ActionType::ProgressReport
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn probe_loop_detects_outage() {
        let h = harness().await;
        h.coordinator.start(h.interceptor.subscribe()).await.unwrap();
        assert!(h.coordinator.is_online());

        h.net.set_online(false);
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!h.coordinator.is_online());

        h.net.set_online(true);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(h.coordinator.is_online());

        h.coordinator.shutdown();
    }

    #[tokio::test]
    async fn connectivity_events_before_start_are_ignored() {
        let h = harness().await;
        h.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;

        assert!(h.coordinator.is_online());
        assert!(h.events.lock().unwrap().is_empty());

        h.coordinator.start(h.interceptor.subscribe()).await.unwrap();
        h.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;
        assert!(!h.coordinator.is_online());
        assert_eq!(*h.events.lock().unwrap(), vec![OfflineEvent::Offline]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_probe_interval_still_probes() {
        let net = Arc::new(ScriptedFetcher::new());
        net.route_status("https://app.test/", StatusCode::OK);
        let (transport, _inbox) = InProcessTransport::channel(8);
        let mut config = CoordinatorConfig::for_origin("https://app.test").unwrap();
        config.probe_interval = Duration::ZERO;
        let coordinator = Arc::new(OfflineCoordinator::new(
            config,
            Arc::new(transport),
            net.clone(),
            CacheStore::in_memory(Default::default()),
        ));
        let bus: tether_events::InMemoryEventBus<ServiceBroadcast> = tether_events::InMemoryEventBus::new();
        coordinator
            .start(tether_events::EventBus::subscribe(&bus))
            .await
            .unwrap();

        net.set_online(false);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!coordinator.is_online());
        coordinator.shutdown();
    }

    #[tokio::test]
    async fn offline_state_composes_connectivity_and_status() {
        let h = harness().await;
        h.coordinator.start(h.interceptor.subscribe()).await.unwrap();

        let status = h.coordinator.get_cache_status().await.unwrap();
        assert_eq!(status.queue_size, 0);

        h.coordinator.enable_offline_mode();
        h.coordinator.enable_offline_mode();
        h.coordinator.handle_platform_event(ConnectivityEvent::Lost).await;

        let state = h.coordinator.get_offline_state();
        assert!(!state.is_online);
        assert!(state.is_offline_mode_manually_enabled);
        assert!(!state.has_cached_content);

        h.coordinator.disable_offline_mode();
        let events = h.events.lock().unwrap().clone();
        assert_eq!(
            events.iter().filter(|e| **e == OfflineEvent::OfflineModeEnabled).count(),
            1
        );
        assert!(events.contains(&OfflineEvent::OfflineModeDisabled));
    }

    #[tokio::test]
    async fn precache_and_availability_use_shared_store() {
        let h = harness().await;
        h.net.route("https://app.test/puzzles/5", FetchResponse::ok().with_body("p5"));

        assert!(!h.coordinator.is_content_available_offline("/puzzles/5").await);
        let stored = h
            .coordinator
            .precache_content(&["https://app.test/puzzles/5".to_string()])
            .await
            .unwrap();
        assert_eq!(stored, 1);
        assert!(h.coordinator.is_content_available_offline("/puzzles/5").await);
        assert!(h.coordinator.is_content_available_offline("https://app.test/puzzles/5").await);

        // the interceptor serves it from the same cache
        let status = h.interceptor.cache_status().await;
        assert_eq!(status.static_cache_size, 1);
        assert!(h.events.lock().unwrap().contains(&OfflineEvent::CacheUpdated { stored: 1 }));
    }
}
