use tokio::sync::oneshot;
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServiceReply};

/// A client message in flight to the interceptor.
///
/// Notes:
/// - `reply` is present only for request/response messages.
/// - Dropping the envelope without replying surfaces as
///   `TransportError::NoReply` on the caller side.
#[derive(Debug)]
pub struct MessageEnvelope {
    message_id: Uuid,
    message: ClientMessage,
    reply: Option<oneshot::Sender<ServiceReply>>,
}

impl MessageEnvelope {
    /// Fire-and-forget message.
    pub fn post(message: ClientMessage) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            message,
            reply: None,
        }
    }

    /// Request message plus the receiver its reply will arrive on.
    pub fn request(message: ClientMessage) -> (Self, oneshot::Receiver<ServiceReply>) {
        let (tx, rx) = oneshot::channel();
        let envelope = Self {
            message_id: Uuid::now_v7(),
            message,
            reply: Some(tx),
        };
        (envelope, rx)
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn message(&self) -> &ClientMessage {
        &self.message
    }

    pub fn into_parts(self) -> (ClientMessage, Option<oneshot::Sender<ServiceReply>>) {
        (self.message, self.reply)
    }
}
