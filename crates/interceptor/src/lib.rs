//! `tether-interceptor` — request interception and the durable action queue.
//!
//! Every outbound request is classified ([`classify`]) and answered by the
//! matching strategy ([`strategy`]): live network, cache, or a synthesized
//! fallback ([`fallback`]). Write actions go through the [`queue`] and are
//! delivered ([`delivery`]) by the drain in [`sync`].
//!
//! [`service::InterceptorService`] ties it together and answers the message
//! protocol from `tether-events`.

pub mod classify;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fallback;
pub mod lifecycle;
pub mod queue;
pub mod service;
pub mod strategy;
pub mod sync;

pub use classify::{RequestClass, classify};
pub use config::{DeliveryEndpoints, InterceptorConfig};
pub use delivery::{DeliveryError, deliver};
pub use error::InstallError;
pub use lifecycle::{activate, install};
pub use queue::{NoopRegistrar, RegistrationError, SYNC_TAG, SyncQueue, SyncRegistrar, WakeRegistrar};
pub use service::InterceptorService;
pub use sync::{DrainDecision, DrainMode, DrainReport, SyncCoordinator};
