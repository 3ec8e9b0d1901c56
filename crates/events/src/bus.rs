//! Broadcast publishing/subscription abstraction (mechanics only).
//!
//! The bus carries [`crate::ServiceBroadcast`]s from the interceptor to every
//! listening context. Delivery is best-effort:
//!
//! - **No history**: a subscriber only sees messages published after it subscribed
//! - **Lossy**: a subscriber that falls too far behind skips the oldest messages
//! - **No backpressure**: publishing never waits on slow subscribers

use std::sync::Arc;

use tokio::sync::broadcast;

/// A subscription to a broadcast stream.
///
/// ```ignore
/// let mut sub = bus.subscribe();
/// while let Some(msg) = sub.recv().await {
///     handle(msg);
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: broadcast::Receiver<M>,
}

impl<M: Clone> Subscription<M> {
    pub fn new(receiver: broadcast::Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Wait for the next message. `None` once the bus is gone.
    ///
    /// Messages lost to lag are skipped with a warning.
    pub async fn recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Broadcast subscriber lagged, skipped {} messages", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive without waiting. `None` when nothing is pending.
    pub fn try_recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) => return Some(msg),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The underlying receiver (for stream adapters).
    pub fn into_inner(self) -> broadcast::Receiver<M> {
        self.receiver
    }
}

/// Transport-agnostic broadcast bus.
///
/// The trait requires `Send + Sync`; any number of tasks may publish
/// concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
