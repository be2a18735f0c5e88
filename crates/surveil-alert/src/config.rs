//! Alert engine configuration.

use crate::severity::SeverityBands;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use surveil_core::AlertRule;

/// Rules and severity bands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub rules: Vec<AlertRule>,
    #[serde(default)]
    pub severity_bands: SeverityBands,
}

impl AlertConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        self.severity_bands.validate()?;

        let mut seen = HashSet::new();
        for rule in &self.rules {
            rule.validate().map_err(|e| e.to_string())?;
            if !seen.insert(rule.id.as_str()) {
                return Err(format!("duplicate rule id {}", rule.id));
            }
        }
        Ok(())
    }
}
