//! Failure classification.
//!
//! Turns a raw failure (message, fetch error, HTTP status) into a category
//! with a severity, a recoverability flag, a retry budget and a message that
//! is safe to show to a user.

use http::StatusCode;
use serde::{Deserialize, Serialize};

use tether_core::FetchError;

/// Broad failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Offline,
    Timeout,
    Network,
    Permission,
    Validation,
    /// Domain failure (bad puzzle data, invalid solution grid).
    Puzzle,
    Unknown,
}

impl ErrorCategory {
    /// Categories in match order. `Unknown` is the fallback and has no keywords.
    pub const MATCH_ORDER: [ErrorCategory; 6] = [
        ErrorCategory::Offline,
        ErrorCategory::Timeout,
        ErrorCategory::Network,
        ErrorCategory::Permission,
        ErrorCategory::Validation,
        ErrorCategory::Puzzle,
    ];

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            ErrorCategory::Offline => &["offline", "no internet", "disconnected"],
            ErrorCategory::Timeout => &["timeout", "timed out"],
            ErrorCategory::Network => &["network", "fetch", "connection", "econnrefused", "dns"],
            ErrorCategory::Permission => &["permission", "forbidden", "unauthorized", "401", "403"],
            ErrorCategory::Validation => &["invalid", "validation", "required", "malformed"],
            ErrorCategory::Puzzle => &["puzzle", "solution", "grid"],
            ErrorCategory::Unknown => &[],
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ErrorCategory::Offline
            | ErrorCategory::Timeout
            | ErrorCategory::Network
            | ErrorCategory::Puzzle => Severity::Medium,
            ErrorCategory::Permission | ErrorCategory::Unknown => Severity::High,
            ErrorCategory::Validation => Severity::Low,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Offline
                | ErrorCategory::Timeout
                | ErrorCategory::Network
                | ErrorCategory::Puzzle
        )
    }

    /// Immediate retries worth attempting. Offline failures wait for
    /// reconnection instead of retrying.
    pub fn retry_budget(&self) -> u32 {
        match self {
            ErrorCategory::Timeout => 2,
            ErrorCategory::Network => 3,
            ErrorCategory::Puzzle => 1,
            _ => 0,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Offline => {
                "You're offline. Your progress is saved and will sync when you reconnect."
            }
            ErrorCategory::Timeout => "The request took too long. Please try again.",
            ErrorCategory::Network => "Network problem. Check your connection and try again.",
            ErrorCategory::Permission => "You don't have permission to do that.",
            ErrorCategory::Validation => "Some of the information provided isn't valid.",
            ErrorCategory::Puzzle => "There was a problem loading this puzzle. Please try again.",
            ErrorCategory::Unknown => "Something went wrong. Please try again later.",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Offline => "offline",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Network => "network",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Puzzle => "puzzle",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Outcome of classifying one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedError {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub recoverable: bool,
    pub max_retries: u32,
    pub user_message: String,
    /// The original message, kept for logs and error reports.
    pub detail: String,
}

impl ClassifiedError {
    fn from_category(category: ErrorCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            severity: category.severity(),
            recoverable: category.is_recoverable(),
            max_retries: category.retry_budget(),
            user_message: category.user_message().to_string(),
            detail: detail.into(),
        }
    }

    /// Whether an immediate retry is worthwhile.
    pub fn is_retryable(&self) -> bool {
        self.recoverable && self.max_retries > 0
    }
}

/// Stateless classifier. Every input maps to exactly one category.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Case-insensitive keyword match, first category in
    /// [`ErrorCategory::MATCH_ORDER`] wins.
    pub fn classify(&self, message: &str) -> ClassifiedError {
        let lowered = message.to_lowercase();
        let category = ErrorCategory::MATCH_ORDER
            .into_iter()
            .find(|c| c.keywords().iter().any(|k| lowered.contains(k)))
            .unwrap_or(ErrorCategory::Unknown);
        ClassifiedError::from_category(category, message)
    }

    pub fn classify_error(&self, error: &(dyn std::error::Error + 'static)) -> ClassifiedError {
        self.classify(&error.to_string())
    }

    /// Fetch errors carry their category in the variant.
    pub fn classify_fetch(&self, error: &FetchError) -> ClassifiedError {
        let category = match error {
            FetchError::Network(msg) if msg.to_lowercase().contains("offline") => {
                ErrorCategory::Offline
            }
            FetchError::Network(_) => ErrorCategory::Network,
            FetchError::Timeout => ErrorCategory::Timeout,
            FetchError::InvalidRequest(_) => ErrorCategory::Validation,
        };
        ClassifiedError::from_category(category, error.to_string())
    }

    /// Classify a non-success HTTP status.
    pub fn classify_status(&self, status: StatusCode) -> ClassifiedError {
        let category = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCategory::Permission,
            StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ErrorCategory::Timeout,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ErrorCategory::Validation
            }
            s if s.is_server_error() => ErrorCategory::Network,
            _ => ErrorCategory::Unknown,
        };
        ClassifiedError::from_category(category, format!("HTTP {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn category(msg: &str) -> ErrorCategory {
        ErrorClassifier::new().classify(msg).category
    }

    #[test]
    fn keywords_map_to_categories() {
        assert_eq!(category("You are OFFLINE"), ErrorCategory::Offline);
        assert_eq!(category("No internet connection"), ErrorCategory::Offline);
        assert_eq!(category("request timed out after 30s"), ErrorCategory::Timeout);
        assert_eq!(category("Failed to fetch"), ErrorCategory::Network);
        assert_eq!(category("connect ECONNREFUSED 127.0.0.1"), ErrorCategory::Network);
        assert_eq!(category("HTTP 403"), ErrorCategory::Permission);
        assert_eq!(category("field is required"), ErrorCategory::Validation);
        assert_eq!(category("puzzle data corrupt"), ErrorCategory::Puzzle);
        assert_eq!(category("segfault"), ErrorCategory::Unknown);
    }

    #[test]
    fn first_match_wins() {
        // "disconnected" (offline) precedes "connection" (network)
        assert_eq!(category("socket disconnected"), ErrorCategory::Offline);
        // timeout precedes network
        assert_eq!(category("network timeout"), ErrorCategory::Timeout);
        // validation precedes puzzle
        assert_eq!(category("invalid puzzle grid"), ErrorCategory::Validation);
    }

    #[test]
    fn attributes_follow_category() {
        let c = ErrorClassifier::new();

        let net = c.classify("network down");
        assert_eq!(net.severity, Severity::Medium);
        assert!(net.recoverable);
        assert_eq!(net.max_retries, 3);
        assert!(net.is_retryable());

        let offline = c.classify("offline");
        assert!(offline.recoverable);
        assert_eq!(offline.max_retries, 0);
        assert!(!offline.is_retryable());

        let perm = c.classify("forbidden");
        assert_eq!(perm.severity, Severity::High);
        assert!(!perm.recoverable);

        let validation = c.classify("malformed body");
        assert_eq!(validation.severity, Severity::Low);

        let unknown = c.classify("boom");
        assert_eq!(unknown.severity, Severity::High);
        assert_eq!(unknown.detail, "boom");
    }

    #[test]
    fn fetch_errors_and_statuses() {
        let c = ErrorClassifier::new();
        assert_eq!(
            c.classify_fetch(&FetchError::Network("offline".into())).category,
            ErrorCategory::Offline
        );
        assert_eq!(
            c.classify_fetch(&FetchError::Network("dns lookup failed".into())).category,
            ErrorCategory::Network
        );
        assert_eq!(c.classify_fetch(&FetchError::Timeout).category, ErrorCategory::Timeout);

        assert_eq!(c.classify_status(StatusCode::FORBIDDEN).category, ErrorCategory::Permission);
        assert_eq!(c.classify_status(StatusCode::BAD_GATEWAY).category, ErrorCategory::Network);
        assert_eq!(c.classify_status(StatusCode::IM_A_TEAPOT).category, ErrorCategory::Unknown);
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

        #[test]
        fn classification_is_total_and_consistent(msg in ".*") {
            let classified = ErrorClassifier::new().classify(&msg);
            prop_assert_eq!(classified.severity, classified.category.severity());
            prop_assert_eq!(classified.recoverable, classified.category.is_recoverable());
            prop_assert_eq!(classified.max_retries, classified.category.retry_budget());
            prop_assert!(!classified.user_message.is_empty());
            if !classified.recoverable {
                prop_assert_eq!(classified.max_retries, 0);
            }
        }

        #[test]
        fn classification_ignores_case(msg in "[a-zA-Z ]{0,40}") {
            let c = ErrorClassifier::new();
            prop_assert_eq!(
                c.classify(&msg.to_uppercase()).category,
                c.classify(&msg.to_lowercase()).category
            );
        }
    }
}
