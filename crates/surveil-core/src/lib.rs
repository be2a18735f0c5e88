//! Core domain types for the market surveillance pipeline.
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - `Symbol`: Normalized instrument identifier
//! - `Snapshot`: One timestamped market observation
//! - `OrderBook`: Level-2 bid/ask depth
//! - `DetectionResult`: Per-tick anomaly statistics and flags
//! - `AlertRule`, `Alert`, `Severity`: Alert configuration and audit records

pub mod alert;
pub mod book;
pub mod detection;
pub mod error;
pub mod snapshot;
pub mod symbol;

pub use alert::{Alert, AlertId, AlertRule, Direction, MetricKind, RuleScope, Severity};
pub use book::{BookDepth, BookLevel, OrderBook, DEPTH_LEVELS};
pub use detection::{DetectionFlags, DetectionResult, DetectionStatus};
pub use error::{CoreError, Result};
pub use snapshot::Snapshot;
pub use symbol::Symbol;
