//! Detector output types.

use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Whether the detector had enough history to evaluate a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DetectionStatus {
    /// Statistics were computed over a full trailing window.
    Ready,
    /// Not enough points yet; every statistic is neutral and every flag false.
    InsufficientHistory { have: usize, need: usize },
}

/// Threshold-derived anomaly flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionFlags {
    pub price_spike: bool,
    pub volume_spike: bool,
    pub statistical_outlier: bool,
}

impl DetectionFlags {
    pub fn any(&self) -> bool {
        self.price_spike || self.volume_spike || self.statistical_outlier
    }
}

/// Per-tick detector output for one symbol.
///
/// Derived from the cached series; never persisted independently of the
/// snapshot it describes (alerts embed a copy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub symbol: Symbol,
    /// Timestamp of the snapshot being evaluated.
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub volume: Decimal,
    /// Tick-over-tick price change in percent.
    pub price_change_pct: f64,
    /// Current volume over trailing mean volume.
    pub volume_ratio: f64,
    /// Bid-ask spread in percent of mid, when quoted.
    pub spread_pct: Option<f64>,
    /// Order book imbalance in percent, when depth was fetched.
    #[serde(default)]
    pub imbalance_pct: Option<f64>,
    /// Standardized price return against the trailing window.
    pub price_zscore: f64,
    /// Standardized volume against the trailing window.
    pub volume_zscore: f64,
    /// Isolation-forest anomaly score in (0, 1]; higher is more anomalous.
    /// `None` until a model has been fitted for the symbol.
    pub outlier_score: Option<f64>,
    pub flags: DetectionFlags,
    pub status: DetectionStatus,
}

impl DetectionResult {
    /// Neutral result for a symbol without enough history.
    pub fn insufficient(
        symbol: Symbol,
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
        have: usize,
        need: usize,
    ) -> Self {
        Self {
            symbol,
            timestamp,
            price,
            volume,
            price_change_pct: 0.0,
            volume_ratio: 1.0,
            spread_pct: None,
            imbalance_pct: None,
            price_zscore: 0.0,
            volume_zscore: 0.0,
            outlier_score: None,
            flags: DetectionFlags::default(),
            status: DetectionStatus::InsufficientHistory { have, need },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == DetectionStatus::Ready
    }
}
