//! In-memory durable action queue.
//!
//! The queue lives as long as the interceptor process; it resets on a cold
//! restart. Only the drain in [`crate::sync`] removes or updates items.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, Notify};

use tether_core::{ActionId, ActionType, QueuedAction};

/// Tag under which background wake-ups are requested.
pub const SYNC_TAG: &str = "sync-actions";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("background sync registration failed for '{tag}': {reason}")]
pub struct RegistrationError {
    pub tag: String,
    pub reason: String,
}

/// Asks the host to run a drain later (ideally once connectivity returns).
pub trait SyncRegistrar: Send + Sync {
    fn register(&self, tag: &str) -> Result<(), RegistrationError>;
}

/// Host without background wake-ups; drains only happen on explicit triggers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRegistrar;

impl SyncRegistrar for NoopRegistrar {
    fn register(&self, _tag: &str) -> Result<(), RegistrationError> {
        Ok(())
    }
}

/// Wakes a background sync loop waiting on the shared `Notify`.
#[derive(Debug, Default, Clone)]
pub struct WakeRegistrar {
    wake: Arc<Notify>,
}

impl WakeRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Arc<Notify> {
        self.wake.clone()
    }
}

impl SyncRegistrar for WakeRegistrar {
    fn register(&self, tag: &str) -> Result<(), RegistrationError> {
        tracing::debug!("Background sync requested under tag {}", tag);
        self.wake.notify_one();
        Ok(())
    }
}

/// Write actions awaiting delivery, in FIFO order.
pub struct SyncQueue {
    items: Mutex<Vec<QueuedAction>>,
    registrar: Arc<dyn SyncRegistrar>,
}

impl std::fmt::Debug for SyncQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncQueue").finish_non_exhaustive()
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::new(Arc::new(NoopRegistrar))
    }
}

impl SyncQueue {
    pub fn new(registrar: Arc<dyn SyncRegistrar>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            registrar,
        }
    }

    /// Append a new action and request a background wake-up.
    ///
    /// A failed wake-up registration is logged; the action stays queued.
    pub async fn enqueue(&self, action_type: ActionType, payload: Value) -> QueuedAction {
        self.push(QueuedAction::new(action_type, payload)).await
    }

    /// Append an already-built action (explicit timestamps, replays).
    pub async fn push(&self, action: QueuedAction) -> QueuedAction {
        {
            let mut items = self.items.lock().await;
            items.push(action.clone());
            tracing::info!(
                "Queued {} action {} ({} pending)",
                action.action_type,
                action.id,
                items.len()
            );
        }

        if let Err(e) = self.registrar.register(SYNC_TAG) {
            tracing::warn!("{}; action {} stays queued", e, action.id);
        }
        action
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Consistent copy of the queue at this instant.
    pub async fn snapshot(&self) -> Vec<QueuedAction> {
        self.items.lock().await.clone()
    }

    /// Drop everything. Returns how many actions were discarded.
    pub async fn clear(&self) -> usize {
        let mut items = self.items.lock().await;
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Apply the outcome of a drain: remove `removed` ids (set difference) and
    /// replace items in `updated` with their new attempt state. Ids no longer
    /// present are ignored; items added since the snapshot are untouched.
    /// Returns the remaining length.
    pub async fn apply_drain(
        &self,
        removed: &HashSet<ActionId>,
        updated: HashMap<ActionId, QueuedAction>,
    ) -> usize {
        let mut items = self.items.lock().await;
        items.retain(|item| !removed.contains(&item.id));
        for item in items.iter_mut() {
            if let Some(next) = updated.get(&item.id) {
                item.attempts = next.attempts;
                item.last_attempt_at = next.last_attempt_at;
            }
        }
        items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRegistrar {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SyncRegistrar for CountingRegistrar {
        fn register(&self, tag: &str) -> Result<(), RegistrationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(tag, SYNC_TAG);
            if self.fail {
                Err(RegistrationError {
                    tag: tag.to_string(),
                    reason: "unsupported".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn enqueue_appends_and_registers() {
        let registrar = Arc::new(CountingRegistrar::default());
        let queue = SyncQueue::new(registrar.clone());

        let a = queue.enqueue(ActionType::ProgressReport, json!({"step": 1})).await;
        let b = queue.enqueue(ActionType::TelemetryEvent, json!({"event": "x"})).await;

        assert_ne!(a.id, b.id);
        assert_eq!(a.attempts, 0);
        let ids: Vec<_> = queue.snapshot().await.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
        assert_eq!(registrar.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn registration_failure_keeps_item() {
        let registrar = Arc::new(CountingRegistrar {
            fail: true,
            ..Default::default()
        });
        let queue = SyncQueue::new(registrar);

        queue.enqueue(ActionType::ErrorReport, json!({})).await;
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn apply_drain_is_a_set_difference() {
        let queue = SyncQueue::default();
        let a = queue.enqueue(ActionType::ProgressReport, json!(1)).await;
        let b = queue.enqueue(ActionType::ProgressReport, json!(2)).await;

        // c arrives after the snapshot the drain worked from
        let snapshot = queue.snapshot().await;
        let c = queue.enqueue(ActionType::ProgressReport, json!(3)).await;

        let mut failed = snapshot[1].clone();
        failed.record_failure(Utc::now());

        let removed: HashSet<_> = [a.id].into_iter().collect();
        let updated: HashMap<_, _> = [(b.id, failed)].into_iter().collect();
        assert_eq!(queue.apply_drain(&removed, updated).await, 2);

        let items = queue.snapshot().await;
        assert_eq!(items[0].id, b.id);
        assert_eq!(items[0].attempts, 1);
        assert_eq!(items[1].id, c.id);
        assert_eq!(items[1].attempts, 0);
    }

    #[tokio::test]
    async fn clear_reports_dropped_count() {
        let queue = SyncQueue::default();
        queue.enqueue(ActionType::CompletionReport, json!({})).await;
        queue.enqueue(ActionType::CompletionReport, json!({})).await;
        assert_eq!(queue.clear().await, 2);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn wake_registrar_notifies() {
        let registrar = WakeRegistrar::new();
        let wake = registrar.notified();
        let queue = SyncQueue::new(Arc::new(registrar));

        queue.enqueue(ActionType::TelemetryEvent, json!({})).await;
        // notify_one stores a permit, so this resolves immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), wake.notified())
            .await
            .unwrap();
    }
}
