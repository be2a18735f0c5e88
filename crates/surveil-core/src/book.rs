//! Level-2 order book snapshots.

use crate::error::{CoreError, Result};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Levels per side that count toward depth and imbalance.
pub const DEPTH_LEVELS: usize = 10;

/// Weight decay per unit of relative distance from mid.
const DISTANCE_DECAY: Decimal = Decimal::TEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Bid and ask depth for one symbol at one instant.
///
/// Bids are kept best (highest) first and asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: Symbol,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub source: String,
}

/// Size-weighted depth on each side, near-mid levels weighted highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookDepth {
    pub bid: Decimal,
    pub ask: Decimal,
}

impl BookDepth {
    /// (bid − ask) / (bid + ask) in percent; `None` for an empty book.
    pub fn imbalance_pct(&self) -> Option<Decimal> {
        let total = self.bid + self.ask;
        if total <= Decimal::ZERO {
            return None;
        }
        Some((self.bid - self.ask) / total * Decimal::ONE_HUNDRED)
    }
}

impl OrderBook {
    /// Create a book, sorting both sides best first.
    pub fn new(
        symbol: Symbol,
        timestamp: DateTime<Utc>,
        mut bids: Vec<BookLevel>,
        mut asks: Vec<BookLevel>,
        source: impl Into<String>,
    ) -> Self {
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self {
            symbol,
            timestamp,
            bids,
            asks,
            source: source.into(),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    pub fn mid(&self) -> Option<Decimal> {
        Some((self.best_bid()? + self.best_ask()?) / Decimal::TWO)
    }

    /// Bid-ask spread as a percentage of mid.
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = self.mid()?;
        if mid <= Decimal::ZERO {
            return None;
        }
        Some((self.best_ask()? - self.best_bid()?) / mid * Decimal::ONE_HUNDRED)
    }

    /// Share of top-of-book size on the bid side, in percent.
    pub fn bid_pressure_pct(&self) -> Option<Decimal> {
        let bid: Decimal = self.bids.iter().take(DEPTH_LEVELS).map(|l| l.size).sum();
        let ask: Decimal = self.asks.iter().take(DEPTH_LEVELS).map(|l| l.size).sum();
        let total = bid + ask;
        if total <= Decimal::ZERO {
            return None;
        }
        Some(bid / total * Decimal::ONE_HUNDRED)
    }

    /// Depth over the top [`DEPTH_LEVELS`] per side, each level weighted by
    /// `1 / (1 + 10·|price − mid| / mid)`.
    pub fn weighted_depth(&self) -> Option<BookDepth> {
        let mid = self.mid()?;
        if mid <= Decimal::ZERO {
            return None;
        }
        let side = |levels: &[BookLevel]| -> Decimal {
            levels
                .iter()
                .take(DEPTH_LEVELS)
                .map(|l| {
                    let distance = (l.price - mid).abs() / mid;
                    l.size / (Decimal::ONE + distance * DISTANCE_DECAY)
                })
                .sum()
        };
        Some(BookDepth {
            bid: side(&self.bids),
            ask: side(&self.asks),
        })
    }

    /// Reject empty sides, non-positive prices, negative sizes and a
    /// crossed top of book.
    pub fn validate(&self) -> Result<()> {
        if self.bids.is_empty() || self.asks.is_empty() {
            return Err(CoreError::MalformedSnapshot(format!(
                "{}: order book missing a side",
                self.symbol
            )));
        }
        for (side, levels) in [("bid", &self.bids), ("ask", &self.asks)] {
            if let Some(level) = levels
                .iter()
                .find(|l| l.price <= Decimal::ZERO || l.size.is_sign_negative())
            {
                return Err(CoreError::MalformedSnapshot(format!(
                    "{}: invalid {side} level {} x {}",
                    self.symbol, level.price, level.size
                )));
            }
        }
        if let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) {
            if bid > ask {
                return Err(CoreError::MalformedSnapshot(format!(
                    "{}: crossed book bid {bid} > ask {ask}",
                    self.symbol
                )));
            }
        }
        Ok(())
    }
}
