//! Application configuration.
//!
//! Loaded once from TOML at startup and read-only for the rest of the run.

use crate::error::{AppError, AppResult};
use crate::notify::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use surveil_alert::AlertConfig;
use surveil_core::Symbol;
use surveil_detector::DetectorConfig;
use surveil_feed::CacheConfig;
use surveil_persistence::PersistenceConfig;
use surveil_source::ProviderConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Symbols polled every tick.
    pub watchlist: Vec<String>,
    /// Tick cadence (ms). Default: 1000.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    /// Concurrent fetch workers. Default: 8.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Bounded queue between workers and the consumer. Default: 256.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-provider call timeout (ms). Default: 5000.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Time in-flight fetches get to finish on shutdown (ms). Default: 2000.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// History points fetched per symbol at startup; 0 disables backfill.
    /// Default: 64.
    #[serde(default = "default_history_backfill")]
    pub history_backfill: usize,
    /// Order-book levels per side fetched with each quote; 0 disables.
    /// Default: 0.
    #[serde(default)]
    pub order_book_depth: usize,
    /// Quote providers in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_polling_interval_ms() -> u64 {
    1_000
}

fn default_pool_size() -> usize {
    8
}

fn default_queue_capacity() -> usize {
    256
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_shutdown_grace_ms() -> u64 {
    2_000
}

fn default_history_backfill() -> usize {
    64
}

/// Upper bound on `order_book_depth`.
const MAX_BOOK_DEPTH: usize = 100;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watchlist: Vec::new(),
            polling_interval_ms: default_polling_interval_ms(),
            pool_size: default_pool_size(),
            queue_capacity: default_queue_capacity(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            history_backfill: default_history_backfill(),
            order_book_depth: 0,
            providers: Vec::new(),
            cache: CacheConfig::default(),
            detector: DetectorConfig::default(),
            alerts: AlertConfig::default(),
            notifiers: Vec::new(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Validate every section.
    pub fn validate(&self) -> AppResult<()> {
        self.check_providers()
            .and_then(|()| self.check_pipeline())
            .map_err(AppError::Config)
    }

    /// Validate everything except the provider chain, for callers that
    /// supply their own source client.
    pub fn validate_pipeline(&self) -> AppResult<()> {
        self.check_pipeline().map_err(AppError::Config)
    }

    fn check_providers(&self) -> Result<(), String> {
        if self.providers.is_empty() {
            return Err("at least one provider is required".to_string());
        }
        for provider in &self.providers {
            provider.validate()?;
        }
        Ok(())
    }

    fn check_pipeline(&self) -> Result<(), String> {
        if self.watchlist.is_empty() {
            return Err("watchlist must name at least one symbol".to_string());
        }
        self.symbols().map_err(|e| e.to_string())?;
        if self.polling_interval_ms == 0 {
            return Err("polling_interval_ms must be positive".to_string());
        }
        if self.pool_size == 0 {
            return Err("pool_size must be positive".to_string());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be positive".to_string());
        }
        if self.fetch_timeout_ms == 0 {
            return Err("fetch_timeout_ms must be positive".to_string());
        }
        if self.order_book_depth > MAX_BOOK_DEPTH {
            return Err(format!(
                "order_book_depth ({}) must be at most {MAX_BOOK_DEPTH}",
                self.order_book_depth
            ));
        }
        self.cache.validate()?;
        self.detector.validate()?;
        if self.cache.max_points < self.detector.min_history() {
            return Err(format!(
                "cache.max_points ({}) must hold at least detector.window + 2 ({}) points",
                self.cache.max_points,
                self.detector.min_history()
            ));
        }
        self.alerts.validate()?;
        for notifier in &self.notifiers {
            notifier.validate()?;
        }
        self.persistence.validate()
    }

    /// Normalized watchlist, duplicates removed, in configured order.
    pub fn symbols(&self) -> AppResult<Vec<Symbol>> {
        let mut symbols: Vec<Symbol> = Vec::with_capacity(self.watchlist.len());
        for raw in &self.watchlist {
            let symbol = Symbol::parse(raw)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }

    /// Replace the provider chain with a single simulated provider whose
    /// budget covers every request per symbol per tick plus the backfill.
    pub fn use_simulated_providers(&mut self) {
        let mut provider = ProviderConfig::simulated("simulated");
        let symbols = self.watchlist.len().max(1) as u64;
        let per_tick = if self.order_book_depth > 0 { 2 } else { 1 };
        let backfill = if self.history_backfill > 0 { symbols } else { 0 };
        let ticks_per_window =
            provider.window_secs.saturating_mul(1_000) / self.polling_interval_ms.max(1) + 1;
        let per_window = ticks_per_window
            .saturating_mul(symbols * per_tick)
            .saturating_add(backfill);
        provider.max_requests = per_window.clamp(1, u64::from(u32::MAX)) as u32;
        self.providers = vec![provider];
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
