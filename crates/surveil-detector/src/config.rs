//! Detector configuration.

use crate::isolation_forest::ForestParams;
use serde::{Deserialize, Serialize};

/// Configuration for anomaly detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Trailing points used for rolling statistics.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Standard deviations (and mean volumes) below this are treated as zero.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    /// |z| above this marks a statistical outlier.
    #[serde(default = "default_zscore_cutoff")]
    pub zscore_cutoff: f64,
    /// New points between outlier-model refits.
    #[serde(default = "default_refit_every")]
    pub refit_every: usize,
    /// Feature rows required before the first fit.
    #[serde(default = "default_min_fit_points")]
    pub min_fit_points: usize,
    /// Expected outlier fraction; sets the model's score cutoff.
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    /// Rows subsampled per tree.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_window() -> usize {
    20
}

fn default_epsilon() -> f64 {
    1e-9
}

fn default_zscore_cutoff() -> f64 {
    3.0
}

fn default_refit_every() -> usize {
    50
}

fn default_min_fit_points() -> usize {
    50
}

fn default_contamination() -> f64 {
    0.1
}

fn default_n_trees() -> usize {
    100
}

fn default_sample_size() -> usize {
    256
}

fn default_seed() -> u64 {
    42
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            epsilon: default_epsilon(),
            zscore_cutoff: default_zscore_cutoff(),
            refit_every: default_refit_every(),
            min_fit_points: default_min_fit_points(),
            contamination: default_contamination(),
            n_trees: default_n_trees(),
            sample_size: default_sample_size(),
            seed: default_seed(),
        }
    }
}

impl DetectorConfig {
    /// Points required before statistics are computed.
    pub fn min_history(&self) -> usize {
        self.window + 2
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            sample_size: self.sample_size,
            contamination: self.contamination,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.window < 2 {
            return Err(format!("window ({}) must be at least 2", self.window));
        }
        if !(self.epsilon > 0.0 && self.epsilon.is_finite()) {
            return Err(format!("epsilon ({}) must be positive", self.epsilon));
        }
        if !(self.zscore_cutoff > 0.0 && self.zscore_cutoff.is_finite()) {
            return Err(format!(
                "zscore_cutoff ({}) must be positive",
                self.zscore_cutoff
            ));
        }
        if self.refit_every == 0 {
            return Err("refit_every must be positive".to_string());
        }
        if self.min_fit_points < 8 {
            return Err(format!(
                "min_fit_points ({}) must be at least 8",
                self.min_fit_points
            ));
        }
        if !(self.contamination > 0.0 && self.contamination < 0.5) {
            return Err(format!(
                "contamination ({}) must be in (0, 0.5)",
                self.contamination
            ));
        }
        if self.n_trees == 0 {
            return Err("n_trees must be positive".to_string());
        }
        if self.sample_size < 2 {
            return Err(format!(
                "sample_size ({}) must be at least 2",
                self.sample_size
            ));
        }
        Ok(())
    }
}
