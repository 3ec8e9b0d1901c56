//! Synthesized responses for when neither network nor cache can answer.

use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use serde::Serialize;

use tether_core::FetchResponse;

pub const X_OFFLINE: HeaderName = HeaderName::from_static("x-offline");
pub const X_CACHED: HeaderName = HeaderName::from_static("x-cached");

/// Field order is part of the wire contract.
#[derive(Serialize)]
struct OfflineApiBody {
    error: &'static str,
    message: &'static str,
    cached: bool,
}

/// 503 for an API read with no network and no cached copy.
pub fn offline_api_response() -> FetchResponse {
    let body = OfflineApiBody {
        error: "offline",
        message: "This content is not available offline",
        cached: false,
    };
    FetchResponse::new(StatusCode::SERVICE_UNAVAILABLE)
        .with_json(&body)
        .with_header(X_OFFLINE, HeaderValue::from_static("true"))
}

/// A cached API response, marked as such.
pub fn cached_api_response(cached: FetchResponse) -> FetchResponse {
    cached.with_header(X_CACHED, HeaderValue::from_static("true"))
}

/// 404 for an asset with no network and no cached copy.
pub fn offline_static_response() -> FetchResponse {
    FetchResponse::new(StatusCode::NOT_FOUND)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
        .with_body("Resource not available offline")
}

/// Self-contained page for a navigation with no network and no cached
/// offline document.
pub fn offline_navigation_response() -> FetchResponse {
    FetchResponse::ok()
        .with_header(CONTENT_TYPE, HeaderValue::from_static("text/html"))
        .with_body(OFFLINE_PAGE)
}

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Offline</title>
  <style>
    body { font-family: system-ui, sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f5f5f4; color: #1c1917; }
    main { text-align: center; max-width: 28rem; padding: 2rem; }
    h1 { font-size: 1.5rem; margin-bottom: 0.5rem; }
    p { color: #57534e; line-height: 1.5; }
    button { margin-top: 1.5rem; padding: 0.75rem 1.5rem; border: 0; border-radius: 0.5rem; background: #1c1917; color: #fff; font-size: 1rem; cursor: pointer; }
  </style>
</head>
<body>
  <main>
    <h1>You're offline</h1>
    <p>This page isn't available without a connection. Your progress is saved and will sync when you're back online.</p>
    <button onclick="location.reload()">Try again</button>
  </main>
  <script>
    window.addEventListener('online', function () { location.reload(); });
  </script>
</body>
</html>
"#;
