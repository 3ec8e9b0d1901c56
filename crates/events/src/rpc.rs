//! Request/response over a message channel.
//!
//! The coordinator never touches the interceptor's state directly; it sends
//! [`ClientMessage`]s through a [`Transport`] and, for request messages,
//! awaits a [`ServiceReply`].

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use tether_core::ActionType;

use crate::envelope::MessageEnvelope;
use crate::protocol::{CacheStatus, ClientMessage, ServiceReply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The interceptor is gone (context torn down or never started).
    #[error("transport closed")]
    Closed,

    /// The interceptor dropped the request without answering.
    #[error("no reply to {0}")]
    NoReply(&'static str),

    /// The reply did not match the request.
    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    /// Remote transports: the message could not be carried or decoded.
    #[error("transport failure: {0}")]
    Remote(String),
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send without waiting for an answer.
    async fn post(&self, message: ClientMessage) -> Result<(), TransportError>;

    /// Send and wait for the reply.
    async fn request(&self, message: ClientMessage) -> Result<ServiceReply, TransportError>;

    /// Whether messages can currently be delivered.
    fn is_connected(&self) -> bool {
        true
    }
}

#[async_trait::async_trait]
impl<T> Transport for std::sync::Arc<T>
where
    T: Transport + ?Sized,
{
    async fn post(&self, message: ClientMessage) -> Result<(), TransportError> {
        (**self).post(message).await
    }

    async fn request(&self, message: ClientMessage) -> Result<ServiceReply, TransportError> {
        (**self).request(message).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Channel transport to an interceptor in the same process.
#[derive(Debug, Clone)]
pub struct InProcessTransport {
    sender: mpsc::Sender<MessageEnvelope>,
}

impl InProcessTransport {
    /// Transport plus the inbox the interceptor consumes.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<MessageEnvelope>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait::async_trait]
impl Transport for InProcessTransport {
    async fn post(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.sender
            .send(MessageEnvelope::post(message))
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn request(&self, message: ClientMessage) -> Result<ServiceReply, TransportError> {
        let name = message.type_name();
        let (envelope, reply) = MessageEnvelope::request(message);
        self.sender
            .send(envelope)
            .await
            .map_err(|_| TransportError::Closed)?;
        reply.await.map_err(|_| TransportError::NoReply(name))
    }

    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Typed client over any [`Transport`].
#[derive(Debug, Clone)]
pub struct InterceptorClient<T> {
    transport: T,
}

impl<T: Transport> InterceptorClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn queue_action(
        &self,
        action_type: ActionType,
        payload: Value,
    ) -> Result<(), TransportError> {
        self.transport
            .post(ClientMessage::queue_action(action_type, payload))
            .await
    }

    pub async fn queue_size(&self) -> Result<usize, TransportError> {
        match self.transport.request(ClientMessage::GetQueueSize).await? {
            ServiceReply::QueueSize(reply) => Ok(reply.queue_size),
            _ => Err(TransportError::UnexpectedReply("GET_QUEUE_SIZE")),
        }
    }

    pub async fn clear_queue(&self) -> Result<bool, TransportError> {
        match self.transport.request(ClientMessage::ClearQueue).await? {
            ServiceReply::Cleared(reply) => Ok(reply.success),
            _ => Err(TransportError::UnexpectedReply("CLEAR_QUEUE")),
        }
    }

    pub async fn cache_status(&self) -> Result<CacheStatus, TransportError> {
        match self.transport.request(ClientMessage::GetCacheStatus).await? {
            ServiceReply::CacheStatus(status) => Ok(status),
            _ => Err(TransportError::UnexpectedReply("GET_CACHE_STATUS")),
        }
    }

    pub async fn trigger_sync(&self) -> Result<(), TransportError> {
        self.transport.post(ClientMessage::TriggerSync).await
    }
}
