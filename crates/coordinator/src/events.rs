//! Coordinator events and listener registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use tether_core::ActionType;
use tether_events::SyncSummary;

/// Something the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OfflineEvent {
    Online,
    Offline,
    ActionQueued { action_type: ActionType },
    SyncComplete(SyncSummary),
    CacheUpdated { stored: usize },
    OfflineModeEnabled,
    OfflineModeDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&OfflineEvent) + Send + Sync>;

/// Unordered set of plain callbacks.
#[derive(Default)]
pub struct Listeners {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Listener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.insert(id, listener);
        }
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .map(|mut l| l.remove(&id).is_some())
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every listener. Callbacks run outside the registry lock, so a
    /// listener may register or remove listeners.
    pub fn emit(&self, event: &OfflineEvent) {
        let current: Vec<Listener> = match self.listeners.lock() {
            Ok(listeners) => listeners.values().cloned().collect(),
            Err(_) => return,
        };
        tracing::debug!("Emitting {:?} to {} listeners", event, current.len());
        for listener in current {
            listener(event);
        }
    }
}
