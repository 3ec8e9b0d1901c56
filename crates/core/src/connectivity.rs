//! Connectivity state and the derived offline view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only two ways connectivity can change, whichever detection source
/// (platform signal or liveness probe) noticed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityEvent {
    Restored,
    Lost,
}

/// Connectivity of the presentation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub is_online: bool,
    pub last_transition_at: DateTime<Utc>,
}

impl ConnectivityState {
    pub fn online(at: DateTime<Utc>) -> Self {
        Self {
            is_online: true,
            last_transition_at: at,
        }
    }

    pub fn offline(at: DateTime<Utc>) -> Self {
        Self {
            is_online: false,
            last_transition_at: at,
        }
    }

    /// Apply a connectivity event. Returns `true` when the state actually
    /// transitioned; repeated reports of the current state are no-ops and do
    /// not move `last_transition_at`.
    pub fn apply(&mut self, event: ConnectivityEvent, at: DateTime<Utc>) -> bool {
        let target = matches!(event, ConnectivityEvent::Restored);
        if self.is_online == target {
            return false;
        }
        self.is_online = target;
        self.last_transition_at = at;
        true
    }
}

/// Read-only offline view handed to the presentation layer.
///
/// Always recomputed from connectivity + the last known cache status; never
/// stored as a source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineState {
    pub is_online: bool,
    pub is_offline_mode_manually_enabled: bool,
    pub has_cached_content: bool,
    pub queued_action_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
}
