//! Prometheus metrics and structured logging for machine-status.
//!
//! - Prometheus metrics for source health, fetch latency, reconnects and
//!   viewer sessions
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
