//! Bounded snapshot history for one symbol.

use crate::config::CacheConfig;
use crate::error::{FeedError, FeedResult};
use chrono::Duration;
use std::collections::VecDeque;
use surveil_core::{Snapshot, Symbol};

/// Ordered, bounded sequence of snapshots for a single symbol.
///
/// Timestamps are non-decreasing: a snapshot older than the newest entry is
/// rejected, never inserted. Equal timestamps are accepted.
#[derive(Debug, Clone)]
pub struct SymbolSeries {
    symbol: Symbol,
    points: VecDeque<Snapshot>,
    max_points: usize,
    max_age: Duration,
}

impl SymbolSeries {
    pub fn new(symbol: Symbol, config: &CacheConfig) -> Self {
        Self {
            symbol,
            points: VecDeque::with_capacity(config.max_points.min(1024)),
            max_points: config.max_points,
            max_age: config.max_age(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Append a snapshot and evict points outside the retention window.
    ///
    /// Returns the number of evicted points.
    pub fn push(&mut self, snapshot: Snapshot) -> FeedResult<usize> {
        if snapshot.symbol != self.symbol {
            return Err(FeedError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: snapshot.symbol,
            });
        }
        snapshot.validate()?;

        if let Some(newest) = self.points.back() {
            if snapshot.timestamp < newest.timestamp {
                return Err(FeedError::OutOfOrder {
                    symbol: self.symbol.clone(),
                    newest: newest.timestamp,
                    got: snapshot.timestamp,
                });
            }
        }

        let cutoff = snapshot.timestamp - self.max_age;
        self.points.push_back(snapshot);

        let before = self.points.len();
        while self.points.len() > self.max_points {
            self.points.pop_front();
        }
        while self.points.front().is_some_and(|p| p.timestamp < cutoff) {
            self.points.pop_front();
        }
        Ok(before - self.points.len())
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.points.iter()
    }

    /// Owned copy of the history, oldest first.
    pub fn to_vec(&self) -> Vec<Snapshot> {
        self.points.iter().cloned().collect()
    }

    /// Owned copy of the newest `n` points, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Snapshot> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).cloned().collect()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}
