//! Prometheus metrics and structured logging for roomwatch.
//!
//! - Structured logging with tracing (pretty or JSON)
//! - Prometheus metrics for the serial link, readings, commands and sessions

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{default_filter, init_logging};
pub use metrics::Metrics;
