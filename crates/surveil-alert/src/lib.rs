//! Alert state machine for the surveillance pipeline.
//!
//! Turns detector output into deduplicated, severity-ranked alerts:
//! - Threshold crossing per rule and direction
//! - Per (symbol, rule) cooldown suppression
//! - Severity from the breach multiple
//! - In-memory audit log with acknowledgement and export

pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod severity;

pub use config::AlertConfig;
pub use engine::AlertEngine;
pub use error::{AlertError, AlertResult};
pub use log::{AlertExport, AlertLog, AlertSummary};
pub use severity::SeverityBands;
