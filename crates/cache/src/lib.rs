//! `tether-cache` — named response caches.
//!
//! Two layers:
//! - [`CacheStorage`]: a backend holding named caches of `key → FetchResponse`
//!   (in memory here, SQLite in `tether-infra`)
//! - [`CacheStore`]: the generation-tagged STATIC/API view the interceptor and
//!   the coordinator share

pub mod error;
pub mod memory;
pub mod storage;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use memory::InMemoryCacheStorage;
pub use storage::CacheStorage;
pub use store::{CacheGeneration, CacheKind, CacheSnapshot, CacheStore};
