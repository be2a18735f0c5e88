//! Simulated quote provider for dry runs.
//!
//! Produces a seeded random walk per symbol with a synthetic quote around
//! the last price, a backward walk for history and a synthetic order book.
//! Deterministic for a given seed and call order.

use crate::provider::{BoxFuture, DataKind, FetchOutcome, QuoteProvider};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use surveil_core::{BookLevel, OrderBook, Snapshot, Symbol};

/// Maximum per-tick relative price move.
const MAX_STEP: f64 = 0.004;
/// Half spread relative to price.
const HALF_SPREAD: f64 = 0.0005;
const BASE_VOLUME: f64 = 10_000.0;
/// Spacing between simulated history points.
const HISTORY_STEP_SECS: i64 = 60;
/// Levels per side in a simulated book.
const BOOK_LEVELS: usize = 20;
/// Relative price gap between adjacent book levels.
const LEVEL_GAP: f64 = 0.0005;
const MEAN_LEVEL_SIZE: f64 = 500.0;

fn to_dec(v: f64) -> Option<Decimal> {
    Decimal::from_f64(v).map(|d| d.round_dp(4))
}

struct WalkState {
    rng: StdRng,
    prices: HashMap<Symbol, f64>,
}

/// Provider generating random-walk quotes without network access.
pub struct SimulatedProvider {
    id: String,
    state: Mutex<WalkState>,
}

impl SimulatedProvider {
    pub fn new(id: impl Into<String>, seed: u64) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(WalkState {
                rng: StdRng::seed_from_u64(seed),
                prices: HashMap::new(),
            }),
        }
    }

    fn next_snapshot(&self, symbol: &Symbol) -> FetchOutcome {
        let mut state = self.state.lock();
        let WalkState { rng, prices } = &mut *state;

        let price = prices
            .entry(symbol.clone())
            .or_insert_with(|| rng.gen_range(20.0..500.0));
        *price *= 1.0 + rng.gen_range(-MAX_STEP..MAX_STEP);
        let price = *price;
        let volume = BASE_VOLUME * rng.gen_range(0.5..1.5);

        let (Some(px), Some(vol), Some(bid), Some(ask)) = (
            to_dec(price),
            to_dec(volume.round()),
            to_dec(price * (1.0 - HALF_SPREAD)),
            to_dec(price * (1.0 + HALF_SPREAD)),
        ) else {
            return FetchOutcome::Malformed(format!("non-finite simulated price {price}"));
        };

        FetchOutcome::Success(
            Snapshot::new(symbol.clone(), Utc::now(), px, vol, self.id.clone()).with_quote(bid, ask),
        )
    }

    /// Walk backwards from the current price, then return oldest first.
    fn history(&self, symbol: &Symbol, limit: usize) -> FetchOutcome<Vec<Snapshot>> {
        let mut state = self.state.lock();
        let WalkState { rng, prices } = &mut *state;

        let mut price = *prices
            .entry(symbol.clone())
            .or_insert_with(|| rng.gen_range(20.0..500.0));
        let now = Utc::now();
        let mut points = Vec::with_capacity(limit);
        for i in 0..limit {
            let volume = BASE_VOLUME * rng.gen_range(0.5..1.5);
            let (Some(px), Some(vol)) = (to_dec(price), to_dec(volume.round())) else {
                return FetchOutcome::Malformed(format!("non-finite simulated price {price}"));
            };
            let at = now - Duration::seconds(HISTORY_STEP_SECS * (i as i64 + 1));
            points.push(Snapshot::new(symbol.clone(), at, px, vol, self.id.clone()));
            price /= 1.0 + rng.gen_range(-MAX_STEP..MAX_STEP);
        }
        points.reverse();
        FetchOutcome::Success(points)
    }

    /// Levels spread away from the last price with exponentially distributed sizes.
    fn order_book(&self, symbol: &Symbol, depth: usize) -> FetchOutcome<OrderBook> {
        let mut state = self.state.lock();
        let WalkState { rng, prices } = &mut *state;

        let price = *prices
            .entry(symbol.clone())
            .or_insert_with(|| rng.gen_range(20.0..500.0));
        let levels = depth.min(BOOK_LEVELS);
        let mut bids = Vec::with_capacity(levels);
        let mut asks = Vec::with_capacity(levels);
        for i in 0..levels {
            let offset = HALF_SPREAD + LEVEL_GAP * i as f64;
            for (side, level_price) in [
                (&mut bids, price * (1.0 - offset)),
                (&mut asks, price * (1.0 + offset)),
            ] {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let size = (-u.ln() * MEAN_LEVEL_SIZE).round().max(1.0);
                let (Some(p), Some(s)) = (to_dec(level_price), to_dec(size)) else {
                    return FetchOutcome::Malformed(format!("non-finite simulated level {level_price}"));
                };
                side.push(BookLevel::new(p, s));
            }
        }
        FetchOutcome::Success(OrderBook::new(symbol.clone(), Utc::now(), bids, asks, self.id.clone()))
    }
}

impl QuoteProvider for SimulatedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports(&self, _kind: DataKind) -> bool {
        true
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move { self.next_snapshot(symbol) })
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        limit: usize,
    ) -> BoxFuture<'a, FetchOutcome<Vec<Snapshot>>> {
        Box::pin(async move { self.history(symbol, limit) })
    }

    fn fetch_order_book<'a>(
        &'a self,
        symbol: &'a Symbol,
        depth: usize,
    ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
        Box::pin(async move { self.order_book(symbol, depth) })
    }
}
