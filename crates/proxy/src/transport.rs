//! [`Transport`] over HTTP, for presentation contexts in another process.

use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use tether_events::{ClientMessage, ServiceReply, Transport, TransportError};

use crate::app::MESSAGE_PATH;

/// Posts protocol messages as JSON to a proxy's message endpoint.
///
/// Reports disconnected after a request fails to reach the proxy, and
/// connected again after the next one that does.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    connected: AtomicBool,
}

impl HttpTransport {
    /// `base` is the proxy's own origin.
    pub fn new(base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self::with_client(reqwest::Client::new(), base.join(MESSAGE_PATH)?))
    }

    pub fn with_client(client: reqwest::Client, endpoint: Url) -> Self {
        Self {
            client,
            endpoint,
            connected: AtomicBool::new(true),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send(&self, message: &ClientMessage) -> Result<reqwest::Response, TransportError> {
        let response = match self.client.post(self.endpoint.clone()).json(message).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Message {} not delivered: {}", message.type_name(), e);
                self.connected.store(false, Ordering::Relaxed);
                return Err(TransportError::Closed);
            }
        };
        self.connected.store(true, Ordering::Relaxed);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Remote(format!("{status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn post(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.send(&message).await.map(|_| ())
    }

    async fn request(&self, message: ClientMessage) -> Result<ServiceReply, TransportError> {
        let name = message.type_name();
        let response = self.send(&message).await?;
        response
            .json::<ServiceReply>()
            .await
            .map_err(|_| TransportError::UnexpectedReply(name))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
