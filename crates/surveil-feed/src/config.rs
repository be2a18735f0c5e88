//! Cache retention configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Retention window per symbol series.
///
/// A point is kept only while it is among the last `max_points` points
/// AND no older than `max_age_secs` relative to the newest point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_points")]
    pub max_points: usize,
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

/// Upper bound on `max_age_secs` (10 years).
pub const MAX_AGE_LIMIT_SECS: u64 = 10 * 365 * 86_400;

fn default_max_points() -> usize {
    500
}

fn default_max_age_secs() -> u64 {
    86_400 // 24h
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_points: default_max_points(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::seconds(self.max_age_secs.min(MAX_AGE_LIMIT_SECS) as i64)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_points < 2 {
            return Err(format!(
                "max_points ({}) must be at least 2",
                self.max_points
            ));
        }
        if self.max_age_secs == 0 || self.max_age_secs > MAX_AGE_LIMIT_SECS {
            return Err(format!(
                "max_age_secs ({}) must be in 1..={MAX_AGE_LIMIT_SECS}",
                self.max_age_secs
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CacheConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_tiny_window() {
        let cfg = CacheConfig {
            max_points: 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = CacheConfig {
            max_age_secs: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
