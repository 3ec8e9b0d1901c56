//! Queued write actions.
//!
//! A `QueuedAction` is a write the presentation layer wants delivered
//! (progress, completion, error report, telemetry) that may have to wait for
//! connectivity. Only the sync coordinator mutates an action after it is
//! enqueued.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::id::ActionId;

/// Kind of write action. Each kind has exactly one delivery endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    ProgressReport,
    CompletionReport,
    ErrorReport,
    TelemetryEvent,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::ProgressReport,
        ActionType::CompletionReport,
        ActionType::ErrorReport,
        ActionType::TelemetryEvent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ProgressReport => "PROGRESS_REPORT",
            ActionType::CompletionReport => "COMPLETION_REPORT",
            ActionType::ErrorReport => "ERROR_REPORT",
            ActionType::TelemetryEvent => "TELEMETRY_EVENT",
        }
    }
}

impl core::fmt::Display for ActionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::UnknownActionType(s.to_string()))
    }
}

/// A write action awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    /// Failed delivery attempts so far.
    pub attempts: u32,
    /// When the last failed delivery attempt happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl QueuedAction {
    /// Create a new action stamped with the current time.
    pub fn new(action_type: ActionType, payload: Value) -> Self {
        Self::new_at(action_type, payload, Utc::now())
    }

    /// Create a new action with an explicit enqueue time (tests, replays).
    pub fn new_at(action_type: ActionType, payload: Value, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            id: ActionId::new(),
            action_type,
            payload,
            enqueued_at,
            attempts: 0,
            last_attempt_at: None,
        }
    }

    /// Time elapsed since the action was enqueued.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.enqueued_at
    }

    /// Whether the action is past the retention window.
    pub fn is_stale(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.age(now) > retention
    }

    /// Whether a delivery may be attempted at `now`, given the backoff owed
    /// after the last failure. Never-attempted actions are always due.
    pub fn is_due(&self, now: DateTime<Utc>, backoff: Duration) -> bool {
        match self.last_attempt_at {
            Some(last) => now >= last + backoff,
            None => true,
        }
    }

    /// Record a failed delivery attempt.
    pub fn record_failure(&mut self, at: DateTime<Utc>) {
        self.attempts += 1;
        self.last_attempt_at = Some(at);
    }
}
