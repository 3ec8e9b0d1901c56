//! Shared tracing setup for tether binaries and integration tests.

/// Initialize process-wide logging with JSON output.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::Json);
}

/// Initialize process-wide logging in the given format.
pub fn init_with(format: LogFormat) {
    tracing::init(format);
}

pub use tracing::{LogFormat, ParseLogFormatError};

/// Subscriber configuration (filters, formats).
pub mod tracing;
