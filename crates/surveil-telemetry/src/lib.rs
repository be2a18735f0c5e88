//! Prometheus metrics and structured logging for the surveillance pipeline.
//!
//! - Prometheus metrics for fetches, detections, alerts and sink failures
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
