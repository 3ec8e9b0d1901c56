//! Queue drain.
//!
//! A drain works on a snapshot of the queue, decides every item in FIFO
//! order, then applies all decisions at once:
//!
//! | item state                    | delivery | decision       |
//! |-------------------------------|----------|----------------|
//! | in backoff, stale             | skipped  | `DroppedStale` |
//! | in backoff, fresh             | skipped  | `Deferred`     |
//! | due                           | 2xx      | `Delivered`    |
//! | due                           | failed, stale | `DroppedStale` |
//! | due                           | failed, fresh | `Retained`     |
//!
//! Backoff only applies to [`DrainMode::Scheduled`] drains. A
//! [`DrainMode::Forced`] drain treats every item as due.
//!
//! Items enqueued while a drain runs are not in its snapshot and are left
//! alone. Concurrent drains each work from their own snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use tether_core::{ActionId, Fetcher, QueuedAction};
use tether_events::{EventBus, InMemoryEventBus, ServiceBroadcast, SyncSummary};
use tether_resilience::ErrorClassifier;

use crate::config::InterceptorConfig;
use crate::delivery::deliver;
use crate::queue::SyncQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainMode {
    /// Periodic or enqueue-woken drain; items in backoff are deferred.
    Scheduled,
    /// Reconnect or `TRIGGER_SYNC`; every item is attempted.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainDecision {
    Delivered,
    /// Older than the retention window; removed without (further) delivery.
    DroppedStale,
    /// Delivery failed; kept with one more recorded attempt.
    Retained { attempts: u32 },
    /// Still inside its backoff window; not attempted.
    Deferred,
}

impl DrainDecision {
    pub fn removes(&self) -> bool {
        matches!(self, DrainDecision::Delivered | DrainDecision::DroppedStale)
    }
}

/// Outcome of one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub decisions: Vec<(ActionId, DrainDecision)>,
    pub summary: SyncSummary,
}

impl DrainReport {
    pub fn count(&self, decision: DrainDecision) -> usize {
        self.decisions.iter().filter(|(_, d)| *d == decision).count()
    }

    pub fn retained(&self) -> usize {
        self.decisions
            .iter()
            .filter(|(_, d)| matches!(d, DrainDecision::Retained { .. }))
            .count()
    }
}

/// Drains a [`SyncQueue`] and broadcasts `SYNC_COMPLETE` after each drain.
pub struct SyncCoordinator {
    queue: Arc<SyncQueue>,
    fetcher: Arc<dyn Fetcher>,
    config: Arc<InterceptorConfig>,
    bus: Arc<InMemoryEventBus<ServiceBroadcast>>,
    classifier: ErrorClassifier,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<SyncQueue>,
        fetcher: Arc<dyn Fetcher>,
        config: Arc<InterceptorConfig>,
        bus: Arc<InMemoryEventBus<ServiceBroadcast>>,
    ) -> Self {
        Self {
            queue,
            fetcher,
            config,
            bus,
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub async fn drain(&self, mode: DrainMode) -> DrainReport {
        self.drain_at(Utc::now(), mode).await
    }

    /// Drain as if the current time were `now`.
    pub async fn drain_at(&self, now: DateTime<Utc>, mode: DrainMode) -> DrainReport {
        let snapshot = self.queue.snapshot().await;
        let mut decisions = Vec::with_capacity(snapshot.len());
        let mut removed = HashSet::new();
        let mut updated = HashMap::new();

        for item in snapshot {
            let decision = self.decide(&item, now, mode).await;
            match decision {
                DrainDecision::Delivered | DrainDecision::DroppedStale => {
                    removed.insert(item.id);
                }
                DrainDecision::Retained { .. } => {
                    let mut next = item.clone();
                    next.record_failure(now);
                    updated.insert(item.id, next);
                }
                DrainDecision::Deferred => {}
            }
            decisions.push((item.id, decision));
        }

        let remaining = self.queue.apply_drain(&removed, updated).await;
        let summary = SyncSummary {
            processed_count: removed.len(),
            remaining_count: remaining,
        };

        tracing::info!(
            "Sync drain complete: {} processed, {} remaining",
            summary.processed_count,
            summary.remaining_count
        );
        // Infallible; nobody listening is fine.
        let _ = self.bus.publish(ServiceBroadcast::SyncComplete(summary));

        DrainReport { decisions, summary }
    }

    async fn decide(&self, item: &QueuedAction, now: DateTime<Utc>, mode: DrainMode) -> DrainDecision {
        let stale = item.is_stale(now, self.config.retention);
        let backoff = chrono::Duration::from_std(self.config.retry.delay_for_attempt(item.attempts))
            .unwrap_or(self.config.retention);

        if mode == DrainMode::Scheduled && !item.is_due(now, backoff) {
            if stale {
                tracing::warn!("Dropping stale action {} ({}) during backoff", item.id, item.action_type);
                return DrainDecision::DroppedStale;
            }
            return DrainDecision::Deferred;
        }

        match deliver(self.fetcher.as_ref(), &self.config, item).await {
            Ok(()) => {
                tracing::debug!("Delivered action {} ({})", item.id, item.action_type);
                DrainDecision::Delivered
            }
            Err(e) if stale => {
                tracing::warn!(
                    "Dropping stale action {} ({}) after failed delivery: {}",
                    item.id,
                    item.action_type,
                    e
                );
                DrainDecision::DroppedStale
            }
            Err(e) => {
                let classified = e.classify(&self.classifier);
                tracing::info!(
                    "Delivery of action {} failed ({} error, attempt {}): {}",
                    item.id,
                    classified.category,
                    item.attempts + 1,
                    e
                );
                DrainDecision::Retained {
                    attempts: item.attempts + 1,
                }
            }
        }
    }
}
