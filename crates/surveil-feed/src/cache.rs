//! Per-symbol snapshot cache.
//!
//! Series are created on first update. Readers get owned copies under a
//! short per-series read lock; nothing outside the cache holds a reference
//! to a live series.

use crate::config::CacheConfig;
use crate::error::FeedResult;
use crate::series::SymbolSeries;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use surveil_core::{Snapshot, Symbol};
use tracing::trace;

type SeriesEntry = Arc<RwLock<SymbolSeries>>;

/// Thread-safe bounded cache of recent snapshots per symbol.
pub struct SymbolCache {
    series: DashMap<Symbol, SeriesEntry>,
    config: CacheConfig,
}

impl SymbolCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            series: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn get_or_create(&self, symbol: &Symbol) -> SeriesEntry {
        if let Some(entry) = self.series.get(symbol) {
            return entry.clone();
        }
        self.series
            .entry(symbol.clone())
            .or_insert_with(|| Arc::new(RwLock::new(SymbolSeries::new(symbol.clone(), &self.config))))
            .clone()
    }

    /// Append a snapshot to its symbol's series.
    ///
    /// Returns the series length after the update. Out-of-order and
    /// malformed snapshots are rejected and leave the series unchanged.
    pub fn update(&self, snapshot: Snapshot) -> FeedResult<usize> {
        let entry = self.get_or_create(&snapshot.symbol);
        let mut series = entry.write();
        let evicted = series.push(snapshot)?;
        trace!(symbol = %series.symbol(), len = series.len(), evicted, "Series updated");
        Ok(series.len())
    }

    /// Copy of the recent history for a symbol, oldest first.
    ///
    /// Empty when the symbol has never been updated.
    pub fn read(&self, symbol: &Symbol) -> Vec<Snapshot> {
        self.series
            .get(symbol)
            .map(|entry| entry.read().to_vec())
            .unwrap_or_default()
    }

    /// Copy of the newest `n` points for a symbol, oldest first.
    pub fn read_tail(&self, symbol: &Symbol, n: usize) -> Vec<Snapshot> {
        self.series
            .get(symbol)
            .map(|entry| entry.read().tail(n))
            .unwrap_or_default()
    }

    pub fn latest(&self, symbol: &Symbol) -> Option<Snapshot> {
        self.series
            .get(symbol)
            .and_then(|entry| entry.read().latest().cloned())
    }

    pub fn len(&self, symbol: &Symbol) -> usize {
        self.series
            .get(symbol)
            .map(|entry| entry.read().len())
            .unwrap_or(0)
    }

    /// Symbols with a series, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self.series.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    /// Drop a symbol's history. Returns true if it existed.
    pub fn clear(&self, symbol: &Symbol) -> bool {
        self.series.remove(symbol).is_some()
    }
}

impl Default for SymbolCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
