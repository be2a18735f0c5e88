//! Persistence configuration.

use crate::error::PersistenceResult;
use crate::filter::RetentionPolicy;
use crate::jsonl::JsonLinesSink;
use crate::memory::MemorySink;
use crate::sink::DynPersistenceSink;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
    /// Daily JSON Lines files under `dir`.
    #[default]
    JsonLines,
    /// Process-local storage; nothing survives a restart.
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub backend: SinkBackend,
    /// Output directory for the JSON Lines backend.
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    /// Snapshot records buffered before a flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// Interval between retention passes.
    #[serde(default = "default_retention_interval_secs")]
    pub retention_interval_secs: u64,
}

fn default_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_buffer_size() -> usize {
    100
}

fn default_retention_interval_secs() -> u64 {
    3600
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: SinkBackend::default(),
            dir: default_dir(),
            buffer_size: default_buffer_size(),
            retention: RetentionPolicy::default(),
            retention_interval_secs: default_retention_interval_secs(),
        }
    }
}

impl PersistenceConfig {
    /// In-memory configuration for tests and dry runs.
    pub fn memory() -> Self {
        Self {
            backend: SinkBackend::Memory,
            ..Default::default()
        }
    }

    pub fn retention_interval(&self) -> Duration {
        Duration::from_secs(self.retention_interval_secs)
    }

    /// Build the configured sink.
    pub fn build_sink(&self) -> PersistenceResult<DynPersistenceSink> {
        let sink: DynPersistenceSink = match self.backend {
            SinkBackend::JsonLines => Arc::new(JsonLinesSink::new(&self.dir, self.buffer_size)?),
            SinkBackend::Memory => Arc::new(MemorySink::new()),
        };
        Ok(sink)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("persistence.buffer_size must be positive".to_string());
        }
        if self.retention_interval_secs == 0 {
            return Err("persistence.retention_interval_secs must be positive".to_string());
        }
        if self.backend == SinkBackend::JsonLines && self.dir.as_os_str().is_empty() {
            return Err("persistence.dir must be set for the json_lines backend".to_string());
        }
        self.retention.validate()
    }
}
