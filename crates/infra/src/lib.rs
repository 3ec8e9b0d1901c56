//! Infrastructure adapters: the real network and durable cache storage.

pub mod http_fetcher;
pub mod sqlite_cache;

pub use http_fetcher::HttpFetcher;
pub use sqlite_cache::SqliteCacheStorage;
