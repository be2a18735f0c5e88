//! Anomaly detection for the surveillance pipeline.
//!
//! Per symbol, from its cached history:
//! - Welford rolling mean/std of returns and volume, and their z-scores
//! - Volume ratio against the trailing mean
//! - Isolation-forest outlier score, refit off the hot path

pub mod config;
pub mod detector;
pub mod error;
pub mod features;
pub mod isolation_forest;
pub mod model_registry;
pub mod stats;
pub mod thresholds;

pub use config::DetectorConfig;
pub use detector::{AnomalyDetector, DetectionOutput};
pub use error::{DetectorError, DetectorResult};
pub use features::FeatureRow;
pub use isolation_forest::{ForestParams, IsolationForest};
pub use model_registry::{spawn_refit, FittedModel, ModelRegistry, RefitJob};
pub use stats::RollingStats;
pub use thresholds::SpikeThresholds;
