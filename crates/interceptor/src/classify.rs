//! Request classification.

use http::Method;

use tether_core::FetchRequest;

use crate::config::InterceptorConfig;

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// Not intercepted: straight to the network, never cached.
    Bypass,
    /// Page load: network first, offline page on failure.
    Navigation,
    /// API read: network first, cached copy or 503 on failure.
    Api,
    /// Asset: cache first, network on miss, 404 on failure.
    Static,
}

/// Exactly one class per request. Checks run in order: method and scheme,
/// then navigation, then API prefix.
pub fn classify(request: &FetchRequest, config: &InterceptorConfig) -> RequestClass {
    if request.method != Method::GET || !request.is_http() {
        return RequestClass::Bypass;
    }
    if request.is_navigation() {
        return RequestClass::Navigation;
    }
    if config.is_api_path(request.url.path()) {
        return RequestClass::Api;
    }
    RequestClass::Static
}
