//! Breach-multiple severity bands.

use serde::{Deserialize, Serialize};
use surveil_core::Severity;

/// Upper bounds of the breach multiple `m = |value| / threshold` per band.
///
/// `m <= low_max` is low, `m <= medium_max` medium, `m <= high_max` high,
/// anything above is critical. Bounds must be strictly increasing, which
/// makes classification monotonic in `m`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    #[serde(default = "default_low_max")]
    pub low_max: f64,
    #[serde(default = "default_medium_max")]
    pub medium_max: f64,
    #[serde(default = "default_high_max")]
    pub high_max: f64,
}

fn default_low_max() -> f64 {
    1.0
}

fn default_medium_max() -> f64 {
    2.0
}

fn default_high_max() -> f64 {
    4.0
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            low_max: default_low_max(),
            medium_max: default_medium_max(),
            high_max: default_high_max(),
        }
    }
}

impl SeverityBands {
    pub fn classify(&self, breach_multiple: f64) -> Severity {
        if breach_multiple <= self.low_max {
            Severity::Low
        } else if breach_multiple <= self.medium_max {
            Severity::Medium
        } else if breach_multiple <= self.high_max {
            Severity::High
        } else {
            Severity::Critical
        }
    }

    /// Severity for `value` breaching `threshold` (threshold > 0).
    pub fn for_breach(&self, value: f64, threshold: f64) -> Severity {
        self.classify(value.abs() / threshold)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        let bounds = [self.low_max, self.medium_max, self.high_max];
        if bounds.iter().any(|b| !b.is_finite() || *b <= 0.0) {
            return Err(format!(
                "severity bands ({}, {}, {}) must be positive and finite",
                self.low_max, self.medium_max, self.high_max
            ));
        }
        if !(self.low_max < self.medium_max && self.medium_max < self.high_max) {
            return Err(format!(
                "severity bands must be strictly increasing: low_max ({}) < medium_max ({}) < high_max ({})",
                self.low_max, self.medium_max, self.high_max
            ));
        }
        Ok(())
    }
}
