//! Delivery of one queued action to its endpoint.

use http::StatusCode;
use thiserror::Error;

use tether_core::{CoreError, FetchError, FetchRequest, Fetcher, QueuedAction};
use tether_resilience::{ClassifiedError, ErrorClassifier};

use crate::config::InterceptorConfig;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("could not build delivery request: {0}")]
    Request(#[from] CoreError),

    #[error(transparent)]
    Network(#[from] FetchError),

    #[error("endpoint rejected delivery with {0}")]
    Rejected(StatusCode),
}

impl DeliveryError {
    pub fn classify(&self, classifier: &ErrorClassifier) -> ClassifiedError {
        match self {
            DeliveryError::Request(e) => classifier.classify(&e.to_string()),
            DeliveryError::Network(e) => classifier.classify_fetch(e),
            DeliveryError::Rejected(status) => classifier.classify_status(*status),
        }
    }
}

/// POST the action's payload as JSON to its type's endpoint. Any 2xx is a
/// success.
pub async fn deliver<F>(fetcher: &F, config: &InterceptorConfig, action: &QueuedAction) -> Result<(), DeliveryError>
where
    F: Fetcher + ?Sized,
{
    let url = config.delivery_url(action.action_type)?;
    let request = FetchRequest::post_json(url.as_str(), &action.payload)?;
    let response = fetcher.fetch(request).await?;
    if response.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Rejected(response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use serde_json::json;
    use tether_core::testing::ScriptedFetcher;
    use tether_core::{ActionType, FetchResponse};
    use tether_resilience::ErrorCategory;

    #[tokio::test]
    async fn posts_to_type_endpoint() {
        let net = ScriptedFetcher::new();
        net.route_status("https://app.test/api/completions", StatusCode::CREATED);
        let config = InterceptorConfig::for_origin("https://app.test").unwrap();
        let action = QueuedAction::new(ActionType::CompletionReport, json!({"puzzleId": "p9"}));

        deliver(&net, &config, &action).await.unwrap();
        assert_eq!(
            net.calls(),
            vec![(Method::POST, "https://app.test/api/completions".to_string())]
        );
    }

    #[tokio::test]
    async fn failures_are_classified() {
        let net = ScriptedFetcher::new();
        net.route("https://app.test/api/progress", FetchResponse::new(StatusCode::FORBIDDEN));
        let config = InterceptorConfig::for_origin("https://app.test").unwrap();
        let classifier = ErrorClassifier::new();
        let action = QueuedAction::new(ActionType::ProgressReport, json!({}));

        let rejected = deliver(&net, &config, &action).await.unwrap_err();
        assert!(matches!(rejected, DeliveryError::Rejected(StatusCode::FORBIDDEN)));
        assert_eq!(rejected.classify(&classifier).category, ErrorCategory::Permission);

        net.set_online(false);
        let offline = deliver(&net, &config, &action).await.unwrap_err();
        assert_eq!(offline.classify(&classifier).category, ErrorCategory::Offline);
    }
}
