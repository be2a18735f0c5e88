//! Provider configuration.

use serde::{Deserialize, Serialize};

/// Provider implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// REST quote endpoint.
    #[default]
    Http,
    /// Seeded random-walk quotes, no network.
    Simulated,
}

/// One entry of the ranked provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider identifier, recorded as the snapshot source.
    pub id: String,
    #[serde(default)]
    pub kind: ProviderKind,
    /// Base URL for HTTP providers (e.g. "https://quotes.example.com/v1").
    #[serde(default)]
    pub base_url: Option<String>,
    /// Optional API key, sent as the `apikey` query parameter.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum requests per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Sliding window size in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// RNG seed for simulated providers.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_secs() -> u64 {
    60
}

impl ProviderConfig {
    /// Simulated provider with the default budget.
    pub fn simulated(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ProviderKind::Simulated,
            base_url: None,
            api_key: None,
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            seed: None,
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("provider id must not be empty".to_string());
        }
        if self.max_requests == 0 {
            return Err(format!("{}: max_requests must be positive", self.id));
        }
        if self.window_secs == 0 {
            return Err(format!("{}: window_secs must be positive", self.id));
        }
        if self.kind == ProviderKind::Http {
            match self.base_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(format!("{}: base_url ({url}) must be http(s)", self.id));
                }
                None => return Err(format!("{}: http provider requires base_url", self.id)),
            }
        }
        Ok(())
    }
}
