//! Tracing setup shared by the checkout binaries.

/// Subscriber installation (filters, output format).
pub mod subscriber;

pub use subscriber::{LogFormat, LOG_FORMAT_ENV};

/// Initialize process-wide tracing from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}
