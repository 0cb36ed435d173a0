//! Telemetry module for logging and metrics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - Forwarding counters

mod logging;
mod metrics;

pub use logging::{init_logging, LogConfig, LogFormat};
pub(crate) use logging::is_known_level;
pub use metrics::{Counter, ForwardingStats};
