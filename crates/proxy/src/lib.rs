//! HTTP host for the interceptor: a caching reverse proxy plus the message
//! endpoint presentation contexts talk to.

pub mod app;
pub mod config;
pub mod middleware;
pub mod transport;

pub use config::{ConfigError, ProxyConfig};
pub use transport::HttpTransport;
