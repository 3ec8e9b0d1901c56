//! `Fetcher` backed by reqwest.

use std::time::Duration;

use tether_core::{FetchError, FetchRequest, FetchResponse, Fetcher};

/// Live network access.
///
/// No retry or fallback happens here: failures are returned to the caller,
/// which decides what to serve instead.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::builder(reqwest::Client::builder())
    }

    /// Client with a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        Self::builder(reqwest::Client::builder().timeout(timeout))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn builder(builder: reqwest::ClientBuilder) -> Result<Self, FetchError> {
        let client = builder
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_builder() {
        FetchError::InvalidRequest(err.to_string())
    } else {
        FetchError::Network(err.to_string())
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = request.body.clone() {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(map_error)?;

        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(map_error)?;

        tracing::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(FetchResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};

    async fn spawn_server() -> String {
        let app = Router::new()
            .route("/hello", get(|| async { "hello" }))
            .route("/fail", get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }))
            .route("/echo", post(|body: String| async move { body }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn fetches_status_and_body() {
        let base = spawn_server().await;
        let fetcher = HttpFetcher::new().unwrap();

        let ok = fetcher
            .fetch(FetchRequest::get(&format!("{base}/hello")).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.text(), "hello");

        let fail = fetcher
            .fetch(FetchRequest::get(&format!("{base}/fail")).unwrap())
            .await
            .unwrap();
        assert_eq!(fail.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!fail.is_success());
    }

    #[tokio::test]
    async fn posts_json_body() {
        let base = spawn_server().await;
        let fetcher = HttpFetcher::new().unwrap();

        let req = FetchRequest::post_json(&format!("{base}/echo"), &serde_json::json!({"a": 1})).unwrap();
        let resp = fetcher.fetch(req).await.unwrap();
        assert_eq!(resp.text(), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher
            .fetch(FetchRequest::get(&format!("http://{addr}/")).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
