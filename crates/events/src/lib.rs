//! Messages between the coordinator and the interceptor.
//!
//! - [`protocol`]: the JSON wire format (requests, replies, broadcasts)
//! - [`envelope`]: a message plus its optional reply channel
//! - [`rpc`]: the `Transport` seam and the typed `InterceptorClient`
//! - [`bus`] / [`in_memory_bus`]: fan-out of broadcasts to every listener

pub mod bus;
pub mod envelope;
pub mod in_memory_bus;
pub mod protocol;
pub mod rpc;

pub use bus::{EventBus, Subscription};
pub use envelope::MessageEnvelope;
pub use in_memory_bus::InMemoryEventBus;
pub use protocol::{
    CacheStatus, ClearQueueReply, ClientMessage, QueueActionData, QueueSizeReply, ServiceBroadcast,
    ServiceReply, SyncSummary,
};
pub use rpc::{InProcessTransport, InterceptorClient, Transport, TransportError};
