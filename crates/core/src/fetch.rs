//! Fetch requests, responses and the network seam.
//!
//! `FetchRequest`/`FetchResponse` are transport-neutral: the interceptor,
//! the cache store and the coordinator all speak these types, and only a
//! [`Fetcher`] implementation touches a real HTTP client.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::error::CoreError;

/// What the request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestDestination {
    /// Unknown / programmatic (fetch, XHR)
    #[default]
    Empty,
    /// Top-level or nested document
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
}

/// Request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Page navigation
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// An outbound request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub destination: RequestDestination,
    pub mode: RequestMode,
    pub body: Option<Bytes>,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            destination: RequestDestination::Empty,
            mode: RequestMode::Cors,
            body: None,
        }
    }

    /// Plain GET (subresource / API call).
    pub fn get(url: &str) -> Result<Self, CoreError> {
        Ok(Self::new(Method::GET, parse_url(url)?))
    }

    /// Document navigation.
    pub fn navigate(url: &str) -> Result<Self, CoreError> {
        let mut req = Self::get(url)?;
        req.destination = RequestDestination::Document;
        req.mode = RequestMode::Navigate;
        Ok(req)
    }

    /// JSON POST.
    pub fn post_json<T: Serialize>(url: &str, body: &T) -> Result<Self, CoreError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| CoreError::InvalidBody(format!("{url}: {e}")))?;
        let mut req = Self::new(Method::POST, parse_url(url)?);
        req.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        req.body = Some(Bytes::from(bytes));
        Ok(req)
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    /// Key under which this request's response is cached.
    pub fn cache_key(&self) -> String {
        self.url.as_str().to_string()
    }

    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate || self.destination == RequestDestination::Document
    }
}

fn parse_url(url: &str) -> Result<Url, CoreError> {
    Url::parse(url).map_err(|e| CoreError::invalid_url(format!("{url}: {e}")))
}

/// A response, live or synthesized. Cloning is cheap (`Bytes` body).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json<T: Serialize>(self, value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        self.with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body)
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A request that produced no response at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection refused, DNS failure, reset, no route...
    #[error("network error: {0}")]
    Network(String),
    /// The underlying client gave up waiting.
    #[error("request timed out")]
    Timeout,
    /// The request could not be issued at all.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The network seam. Production uses an HTTP client; tests use scripted fakes.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

#[async_trait::async_trait]
impl<F> Fetcher for Arc<F>
where
    F: Fetcher + ?Sized,
{
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        (**self).fetch(request).await
    }
}
