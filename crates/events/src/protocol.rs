//! Wire protocol.
//!
//! Every message is a JSON object discriminated by `type`:
//!
//! ```text
//! {"type":"QUEUE_ACTION","data":{"type":"PROGRESS_REPORT","payload":{...}}}   (no reply)
//! {"type":"GET_QUEUE_SIZE"}      -> {"queueSize":2}
//! {"type":"CLEAR_QUEUE"}         -> {"success":true}
//! {"type":"GET_CACHE_STATUS"}    -> {"staticCacheSize":3,"apiCacheSize":1,"queueSize":0,"cacheNames":[...]}
//! {"type":"TRIGGER_SYNC"}        (no reply)
//! {"type":"SYNC_COMPLETE","processedCount":2,"remainingCount":0}   (broadcast)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tether_core::ActionType;

/// Payload of a `QUEUE_ACTION` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueActionData {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: Value,
}

/// Coordinator → interceptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    QueueAction { data: QueueActionData },
    GetQueueSize,
    ClearQueue,
    GetCacheStatus,
    /// Run one drain now (sent on every transition to online).
    TriggerSync,
}

impl ClientMessage {
    pub fn queue_action(action_type: ActionType, payload: Value) -> Self {
        Self::QueueAction {
            data: QueueActionData {
                action_type,
                payload,
            },
        }
    }

    /// Whether the interceptor answers this message.
    pub fn expects_reply(&self) -> bool {
        matches!(
            self,
            ClientMessage::GetQueueSize | ClientMessage::ClearQueue | ClientMessage::GetCacheStatus
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ClientMessage::QueueAction { .. } => "QUEUE_ACTION",
            ClientMessage::GetQueueSize => "GET_QUEUE_SIZE",
            ClientMessage::ClearQueue => "CLEAR_QUEUE",
            ClientMessage::GetCacheStatus => "GET_CACHE_STATUS",
            ClientMessage::TriggerSync => "TRIGGER_SYNC",
        }
    }
}

/// Snapshot of cache and queue sizes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub static_cache_size: usize,
    pub api_cache_size: usize,
    pub queue_size: usize,
    pub cache_names: Vec<String>,
}

impl CacheStatus {
    pub fn has_cached_content(&self) -> bool {
        self.static_cache_size > 0 || self.api_cache_size > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSizeReply {
    pub queue_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearQueueReply {
    pub success: bool,
}

/// Interceptor → coordinator reply. Untagged on the wire; the shapes are
/// disjoint once `CacheStatus` (a superset of `QueueSizeReply`) is tried first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceReply {
    CacheStatus(CacheStatus),
    QueueSize(QueueSizeReply),
    Cleared(ClearQueueReply),
}

/// Result of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    /// Items removed from the queue (delivered or dropped as stale).
    pub processed_count: usize,
    pub remaining_count: usize,
}

/// Interceptor → every listening context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceBroadcast {
    SyncComplete(SyncSummary),
}
