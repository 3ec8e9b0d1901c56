//! `tether-core` — shared building blocks for the offline-resilience subsystem.
//!
//! This crate holds the types both execution contexts agree on (queued write
//! actions, connectivity state, fetch requests/responses) plus the `Fetcher`
//! seam every network call goes through. No caching or queueing policy lives here.

pub mod action;
pub mod connectivity;
pub mod error;
pub mod fetch;
pub mod id;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use action::{ActionType, QueuedAction};
pub use connectivity::{ConnectivityEvent, ConnectivityState, OfflineState};
pub use error::{CoreError, CoreResult};
pub use fetch::{
    FetchError, FetchRequest, FetchResponse, Fetcher, RequestDestination, RequestMode,
};
pub use id::ActionId;
