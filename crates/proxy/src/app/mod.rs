//! Axum application wiring.
//!
//! - `routes.rs`: the `/__tether/*` control endpoints and the catch-all
//! - `forward.rs`: conversion between axum and fetch types
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, post},
};
use tower::ServiceBuilder;

use tether_interceptor::InterceptorService;

pub mod errors;
pub mod forward;
pub mod routes;

/// Where presentation contexts post protocol messages.
pub const MESSAGE_PATH: &str = "/__tether/message";
pub const EVENTS_PATH: &str = "/__tether/events";
pub const HEALTH_PATH: &str = "/__tether/health";

/// Build the full router around an already constructed interceptor.
pub fn build_app(service: Arc<InterceptorService>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(routes::health))
        .route(MESSAGE_PATH, post(routes::message))
        .route(EVENTS_PATH, get(routes::events))
        .fallback(routes::intercept)
        .layer(
            ServiceBuilder::new()
                .layer(Extension(service))
                .layer(axum::middleware::from_fn(crate::middleware::log_request)),
        )
}
