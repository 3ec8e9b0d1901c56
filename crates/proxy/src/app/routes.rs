use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    extract::{Extension, Request},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use serde_json::json;
use tokio_stream::{Stream, StreamExt, wrappers::BroadcastStream};

use tether_events::ClientMessage;
use tether_interceptor::{DrainMode, InterceptorService};

use crate::app::errors::json_error;
use crate::app::forward::{ForwardError, to_fetch_request, to_response};

/// GET /__tether/health
pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// POST /__tether/message
///
/// Request/response messages answer with their reply JSON. Fire-and-forget
/// messages answer `202 Accepted` once handled; `TRIGGER_SYNC` answers as soon
/// as its forced drain is started.
pub async fn message(
    Extension(service): Extension<Arc<InterceptorService>>,
    Json(message): Json<ClientMessage>,
) -> Response {
    tracing::debug!("Received {} message", message.type_name());

    if let ClientMessage::TriggerSync = message {
        let service = service.clone();
        tokio::spawn(async move {
            service.drain(DrainMode::Forced).await;
        });
        return StatusCode::ACCEPTED.into_response();
    }

    match service.handle_message(message).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// GET /__tether/events
///
/// Interceptor broadcasts as Server-Sent Events. Lossy: a slow client skips
/// what it missed.
pub async fn events(
    Extension(service): Extension<Arc<InterceptorService>>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let receiver = service.subscribe().into_inner();
    let stream = BroadcastStream::new(receiver).filter_map(|item| {
        let broadcast = item.ok()?;
        match serde_json::to_string(&broadcast) {
            Ok(data) => Some(Ok(SseEvent::default().event("broadcast").data(data))),
            Err(e) => {
                tracing::warn!("Dropping unserializable broadcast: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Every other request: through the interceptor to the upstream.
pub async fn intercept(Extension(service): Extension<Arc<InterceptorService>>, req: Request) -> Response {
    let request = match to_fetch_request(&service.config().origin, req).await {
        Ok(request) => request,
        Err(e @ ForwardError::Body(_)) => {
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, "bad_request_body", e.to_string());
        }
        Err(e @ ForwardError::Url(_)) => {
            return json_error(StatusCode::BAD_REQUEST, "bad_request_target", e.to_string());
        }
    };

    let target = request.url.clone();
    match service.handle_fetch(request).await {
        Ok(fetched) => to_response(fetched),
        Err(e) => {
            tracing::warn!("Upstream request to {} failed: {}", target, e);
            json_error(StatusCode::BAD_GATEWAY, "upstream_unreachable", e.to_string())
        }
    }
}
