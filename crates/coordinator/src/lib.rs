//! `tether-coordinator` — presentation-side offline coordinator.
//!
//! Owns connectivity state for the presentation layer and bridges it to the
//! interceptor through a `tether_events::Transport`.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod probe;
pub mod state;

pub use config::{CoordinatorConfig, MIN_PROBE_INTERVAL};
pub use coordinator::OfflineCoordinator;
pub use error::CoordinatorError;
pub use events::{Listener, ListenerId, OfflineEvent};
pub use state::LifecycleState;
