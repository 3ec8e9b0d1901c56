//! In-process broadcast bus.

use std::convert::Infallible;

use tokio::sync::broadcast;

use crate::bus::{EventBus, Subscription};

const DEFAULT_CAPACITY: usize = 64;

/// In-process pub/sub bus over `tokio::sync::broadcast`.
///
/// - Publishing with no subscribers is not an error
/// - Best-effort fan-out
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    sender: broadcast::Sender<M>,
}

impl<M: Clone> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<M: Clone> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = Infallible;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        // Err only means nobody is listening right now.
        let _ = self.sender.send(message);
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        Subscription::new(self.sender.subscribe())
    }
}
