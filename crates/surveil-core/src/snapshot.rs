//! Market observations.

use crate::book::{BookDepth, OrderBook};
use crate::error::{CoreError, Result};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One timestamped observation of a symbol's market data.
///
/// Immutable once created; every stage downstream of the source client
/// receives either an owned copy or a shared reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: Symbol,
    /// Observation time as reported by (or assigned for) the provider.
    pub timestamp: DateTime<Utc>,
    /// Last traded price.
    pub price: Decimal,
    /// Traded volume for the observation interval.
    pub volume: Decimal,
    /// Best bid, if the provider supplies a quote.
    #[serde(default)]
    pub bid: Option<Decimal>,
    /// Best ask, if the provider supplies a quote.
    #[serde(default)]
    pub ask: Option<Decimal>,
    /// Weighted bid depth from an order book, when one was fetched.
    #[serde(default)]
    pub bid_depth: Option<Decimal>,
    /// Weighted ask depth from an order book, when one was fetched.
    #[serde(default)]
    pub ask_depth: Option<Decimal>,
    /// Identifier of the provider that produced this snapshot.
    pub source: String,
}

impl Snapshot {
    /// Create a snapshot without quote data.
    pub fn new(
        symbol: Symbol,
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol,
            timestamp,
            price,
            volume,
            bid: None,
            ask: None,
            bid_depth: None,
            ask_depth: None,
            source: source.into(),
        }
    }

    /// Attach best bid/ask.
    pub fn with_quote(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Take best bid/ask and weighted depth from an order book.
    ///
    /// A book without both sides leaves the snapshot unchanged.
    pub fn with_book(mut self, book: &OrderBook) -> Self {
        if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
            self.bid = Some(bid);
            self.ask = Some(ask);
        }
        if let Some(depth) = book.weighted_depth() {
            self.bid_depth = Some(depth.bid);
            self.ask_depth = Some(depth.ask);
        }
        self
    }

    /// Check the snapshot is internally consistent.
    ///
    /// Rejects non-positive price, negative volume, negative quote sides and
    /// crossed quotes (bid > ask).
    pub fn validate(&self) -> Result<()> {
        if self.price <= Decimal::ZERO {
            return Err(CoreError::MalformedSnapshot(format!(
                "{}: non-positive price {}",
                self.symbol, self.price
            )));
        }
        if self.volume.is_sign_negative() {
            return Err(CoreError::MalformedSnapshot(format!(
                "{}: negative volume {}",
                self.symbol, self.volume
            )));
        }
        for (side, px) in [
            ("bid", self.bid),
            ("ask", self.ask),
            ("bid depth", self.bid_depth),
            ("ask depth", self.ask_depth),
        ] {
            if let Some(px) = px {
                if px.is_sign_negative() {
                    return Err(CoreError::MalformedSnapshot(format!(
                        "{}: negative {side} {px}",
                        self.symbol
                    )));
                }
            }
        }
        if let (Some(bid), Some(ask)) = (self.bid, self.ask) {
            if bid > ask {
                return Err(CoreError::MalformedSnapshot(format!(
                    "{}: crossed quote bid {bid} > ask {ask}",
                    self.symbol
                )));
            }
        }
        Ok(())
    }

    /// Mid price when both quote sides are present and positive.
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > Decimal::ZERO && ask > Decimal::ZERO => {
                Some((bid + ask) / Decimal::TWO)
            }
            _ => None,
        }
    }

    /// Bid-ask spread as a percentage of mid.
    pub fn spread_pct(&self) -> Option<Decimal> {
        let mid = self.mid()?;
        let (bid, ask) = (self.bid?, self.ask?);
        Some((ask - bid) / mid * Decimal::ONE_HUNDRED)
    }

    /// Order book imbalance in percent, positive when bids dominate.
    pub fn imbalance_pct(&self) -> Option<Decimal> {
        BookDepth {
            bid: self.bid_depth?,
            ask: self.ask_depth?,
        }
        .imbalance_pct()
    }
}
