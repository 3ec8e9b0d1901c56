use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// One log line per request, with status and latency.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        "{} {} -> {} ({} ms)",
        method,
        uri,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
