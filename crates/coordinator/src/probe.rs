//! Same-origin liveness probe.

use http::Method;
use url::Url;

use tether_core::{FetchRequest, Fetcher};

/// `HEAD url`; online iff a 2xx comes back.
pub async fn probe<F>(fetcher: &F, url: &Url) -> bool
where
    F: Fetcher + ?Sized,
{
    let request = FetchRequest::new(Method::HEAD, url.clone());
    match fetcher.fetch(request).await {
        Ok(response) => {
            if !response.is_success() {
                tracing::debug!("Liveness probe {} returned {}", url, response.status);
            }
            response.is_success()
        }
        Err(e) => {
            tracing::debug!("Liveness probe {} failed: {}", url, e);
            false
        }
    }
}
