//! Incoming axum requests to `FetchRequest`s against the upstream, and
//! `FetchResponse`s back to axum responses.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{HeaderMap, HeaderName, Method, header};
use axum::response::Response;
use url::Url;

use tether_core::{FetchRequest, FetchResponse, RequestDestination, RequestMode};

/// Largest request body forwarded upstream.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("request target is not a valid upstream URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("request body could not be read: {0}")]
    Body(String),
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: [HeaderName; 6] = [
        header::CONNECTION,
        header::HOST,
        header::TRANSFER_ENCODING,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
    ];
    for name in hop_by_hop {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers.remove("proxy-connection");
}

/// Rebase `req` onto `upstream` and read its body.
pub async fn to_fetch_request(upstream: &Url, req: Request) -> Result<FetchRequest, ForwardError> {
    let (parts, body) = req.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = upstream.join(target)?;

    let mut request = FetchRequest::new(parts.method.clone(), url);
    request.headers = parts.headers;
    strip_hop_by_hop(&mut request.headers);
    request.headers.remove(header::CONTENT_LENGTH);
    request.destination = destination_of(&request.headers);
    request.mode = mode_of(&parts.method, &request.headers);

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ForwardError::Body(e.to_string()))?;
    if !bytes.is_empty() {
        request.body = Some(bytes);
    }
    Ok(request)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn destination_of(headers: &HeaderMap) -> RequestDestination {
    match header_str(headers, "sec-fetch-dest") {
        Some("document") | Some("iframe") => RequestDestination::Document,
        Some("script") => RequestDestination::Script,
        Some("style") => RequestDestination::Style,
        Some("image") => RequestDestination::Image,
        Some("font") => RequestDestination::Font,
        Some("manifest") => RequestDestination::Manifest,
        _ => RequestDestination::Empty,
    }
}

/// Browsers send `Sec-Fetch-Mode`; other clients asking for HTML with a GET
/// are treated as navigating.
fn mode_of(method: &Method, headers: &HeaderMap) -> RequestMode {
    match header_str(headers, "sec-fetch-mode") {
        Some("navigate") => RequestMode::Navigate,
        Some("same-origin") => RequestMode::SameOrigin,
        Some("no-cors") => RequestMode::NoCors,
        Some(_) => RequestMode::Cors,
        None => {
            let wants_html = header_str(headers, header::ACCEPT.as_str())
                .is_some_and(|accept| accept.contains("text/html"));
            if *method == Method::GET && wants_html {
                RequestMode::Navigate
            } else {
                RequestMode::Cors
            }
        }
    }
}

pub fn to_response(fetched: FetchResponse) -> Response {
    let FetchResponse {
        status,
        mut headers,
        body,
    } = fetched;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
