//! The interceptor service.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;

use tether_cache::{CacheError, CacheStorage, CacheStore};
use tether_core::{FetchError, FetchRequest, FetchResponse, Fetcher};
use tether_events::{
    CacheStatus, ClearQueueReply, ClientMessage, EventBus, InMemoryEventBus, MessageEnvelope, QueueSizeReply,
    ServiceBroadcast, ServiceReply, Subscription,
};

use crate::classify::{RequestClass, classify};
use crate::config::InterceptorConfig;
use crate::error::InstallError;
use crate::lifecycle;
use crate::queue::{SyncQueue, SyncRegistrar, WakeRegistrar};
use crate::strategy;
use crate::sync::{DrainMode, DrainReport, SyncCoordinator};

/// Answers intercepted fetches and protocol messages.
///
/// Cheap to share behind an `Arc`; every operation takes `&self`.
pub struct InterceptorService {
    config: Arc<InterceptorConfig>,
    fetcher: Arc<dyn Fetcher>,
    store: CacheStore,
    queue: Arc<SyncQueue>,
    sync: SyncCoordinator,
    bus: Arc<InMemoryEventBus<ServiceBroadcast>>,
    wake: Option<Arc<Notify>>,
}

impl std::fmt::Debug for InterceptorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorService")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl InterceptorService {
    /// Service whose enqueues wake its own background sync loop.
    pub fn new(config: InterceptorConfig, fetcher: Arc<dyn Fetcher>, storage: Arc<dyn CacheStorage>) -> Self {
        let registrar = WakeRegistrar::new();
        let wake = registrar.notified();
        let mut service = Self::with_registrar(config, fetcher, storage, Arc::new(registrar));
        service.wake = Some(wake);
        service
    }

    pub fn with_registrar(
        config: InterceptorConfig,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
        registrar: Arc<dyn SyncRegistrar>,
    ) -> Self {
        let config = Arc::new(config);
        let store = CacheStore::new(storage, config.cache_generation.clone());
        let queue = Arc::new(SyncQueue::new(registrar));
        let bus = Arc::new(InMemoryEventBus::new());
        let sync = SyncCoordinator::new(queue.clone(), fetcher.clone(), config.clone(), bus.clone());

        Self {
            config,
            fetcher,
            store,
            queue,
            sync,
            bus,
            wake: None,
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.config
    }

    /// Shared handle to this service's caches.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus<ServiceBroadcast>> {
        &self.bus
    }

    pub fn subscribe(&self) -> Subscription<ServiceBroadcast> {
        self.bus.subscribe()
    }

    pub async fn install(&self) -> Result<usize, InstallError> {
        lifecycle::install(self.fetcher.as_ref(), &self.store, &self.config).await
    }

    pub async fn activate(&self) -> Result<Vec<String>, CacheError> {
        lifecycle::activate(&self.store).await
    }

    /// Answer an outbound request.
    ///
    /// Intercepted requests always resolve to a response. Only bypassed
    /// requests (writes, foreign schemes) can fail, with the raw network
    /// error.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let class = classify(&request, &self.config);
        tracing::debug!("{} {} classified as {:?}", request.method, request.url, class);

        let response = match class {
            RequestClass::Bypass => return self.fetcher.fetch(request).await,
            RequestClass::Navigation => {
                strategy::navigation(self.fetcher.as_ref(), &self.store, &self.config, request).await
            }
            RequestClass::Api => strategy::api(self.fetcher.as_ref(), &self.store, request).await,
            RequestClass::Static => strategy::static_asset(self.fetcher.as_ref(), &self.store, request).await,
        };
        Ok(response)
    }

    /// Answer one protocol message. `None` for fire-and-forget messages.
    ///
    /// `TRIGGER_SYNC` runs a forced drain to completion before returning.
    pub async fn handle_message(&self, message: ClientMessage) -> Option<ServiceReply> {
        match message {
            ClientMessage::QueueAction { data } => {
                self.queue.enqueue(data.action_type, data.payload).await;
                None
            }
            ClientMessage::GetQueueSize => Some(ServiceReply::QueueSize(QueueSizeReply {
                queue_size: self.queue.len().await,
            })),
            ClientMessage::ClearQueue => {
                let dropped = self.queue.clear().await;
                tracing::info!("Cleared action queue ({} dropped)", dropped);
                Some(ServiceReply::Cleared(ClearQueueReply { success: true }))
            }
            ClientMessage::GetCacheStatus => Some(ServiceReply::CacheStatus(self.cache_status().await)),
            ClientMessage::TriggerSync => {
                self.drain(DrainMode::Forced).await;
                None
            }
        }
    }

    pub async fn drain(&self, mode: DrainMode) -> DrainReport {
        self.sync.drain(mode).await
    }

    pub async fn cache_status(&self) -> CacheStatus {
        let queue_size = self.queue.len().await;
        match self.store.snapshot().await {
            Ok(snapshot) => CacheStatus {
                static_cache_size: snapshot.static_entries,
                api_cache_size: snapshot.api_entries,
                queue_size,
                cache_names: snapshot.cache_names,
            },
            Err(e) => {
                tracing::warn!("Failed to read cache status: {}", e);
                CacheStatus {
                    queue_size,
                    ..CacheStatus::default()
                }
            }
        }
    }

    /// Serve messages from `inbox` until every sender is gone.
    ///
    /// Messages are handled in arrival order; `TRIGGER_SYNC` drains run on
    /// their own task so queue operations stay responsive meanwhile.
    pub async fn run(self: Arc<Self>, mut inbox: mpsc::Receiver<MessageEnvelope>) {
        tracing::info!("Interceptor message loop started");
        while let Some(envelope) = inbox.recv().await {
            let (message, reply) = envelope.into_parts();
            if let ClientMessage::TriggerSync = message {
                let service = self.clone();
                tokio::spawn(async move {
                    service.drain(DrainMode::Forced).await;
                });
                continue;
            }

            let answer = self.handle_message(message).await;
            if let (Some(tx), Some(answer)) = (reply, answer) {
                // Caller gave up waiting; nothing to do.
                let _ = tx.send(answer);
            }
        }
        tracing::info!("Interceptor message loop stopped");
    }

    /// Spawn the message loop on its own task.
    pub fn spawn(self: &Arc<Self>, inbox: mpsc::Receiver<MessageEnvelope>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(inbox))
    }

    /// Periodic background drain, also woken by every enqueue.
    ///
    /// Runs until `shutdown` is notified. Drains are skipped while the queue
    /// is empty, and leave items inside their backoff window alone.
    pub fn spawn_background_sync(self: &Arc<Self>, interval: Duration, shutdown: Arc<Notify>) -> JoinHandle<()> {
        let service = self.clone();
        let wake = self.wake.clone().unwrap_or_default();

        tokio::spawn(async move {
            tracing::info!("Background sync worker started (interval: {:?})", interval);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.notified() => {
                        tracing::info!("Background sync worker received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {}
                    _ = wake.notified() => {
                        tracing::debug!("Background sync woken by enqueue");
                    }
                }

                if service.queue.is_empty().await {
                    continue;
                }
                service.drain(DrainMode::Scheduled).await;
            }
        })
    }
}
