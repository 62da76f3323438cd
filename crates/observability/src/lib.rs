//! Tracing and logging setup shared by the binaries.

/// Subscriber installation (filters, output format).
pub mod subscriber;

pub use subscriber::{init, LogFormat};
