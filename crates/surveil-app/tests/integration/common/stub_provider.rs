//! Stub quote providers.

use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surveil_core::{Snapshot, Symbol};
use surveil_source::{BoxFuture, DataKind, FetchOutcome, QuoteProvider};

/// Always reports rate limiting.
pub struct RateLimitedProvider {
    id: String,
    calls: Arc<AtomicUsize>,
}

impl RateLimitedProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl QuoteProvider for RateLimitedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<'a>(&'a self, _symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            FetchOutcome::RateLimited
        })
    }
}

/// One quote shape.
#[derive(Debug, Clone, Copy)]
pub struct Quote {
    pub price: Decimal,
    pub volume: Decimal,
}

/// Returns `baseline` for the first `baseline_calls` fetches of a symbol,
/// then `spike` forever.
pub struct ScriptedProvider {
    id: String,
    baseline: Quote,
    spike: Quote,
    baseline_calls: usize,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(id: &str, baseline: Quote, spike: Quote, baseline_calls: usize) -> Self {
        Self {
            id: id.to_string(),
            baseline,
            spike,
            baseline_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

impl QuoteProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let quote = if n < self.baseline_calls {
                self.baseline
            } else {
                self.spike
            };
            FetchOutcome::Success(Snapshot::new(
                symbol.clone(),
                Utc::now(),
                quote.price,
                quote.volume,
                self.id.clone(),
            ))
        })
    }
}

/// Constant quotes after a fixed delay, counting started and finished calls.
pub struct SlowProvider {
    delay: Duration,
    pub started: Arc<AtomicUsize>,
    pub delivered: Arc<AtomicUsize>,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl QuoteProvider for SlowProvider {
    fn id(&self) -> &str {
        "slow"
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.delivered.fetch_add(1, Ordering::SeqCst);
            FetchOutcome::Success(Snapshot::new(
                symbol.clone(),
                Utc::now(),
                Decimal::ONE_HUNDRED,
                Decimal::ONE_THOUSAND,
                "slow",
            ))
        })
    }
}

/// Serves `history` quotes one second apart for backfill and `live` for
/// every quote fetch.
pub struct HistoryProvider {
    history: Quote,
    live: Quote,
    pub history_calls: Arc<AtomicUsize>,
}

impl HistoryProvider {
    pub fn new(history: Quote, live: Quote) -> Self {
        Self {
            history,
            live,
            history_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl QuoteProvider for HistoryProvider {
    fn id(&self) -> &str {
        "history"
    }

    fn supports(&self, kind: DataKind) -> bool {
        kind != DataKind::OrderBook
    }

    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
        Box::pin(async move {
            FetchOutcome::Success(Snapshot::new(
                symbol.clone(),
                Utc::now(),
                self.live.price,
                self.live.volume,
                "history",
            ))
        })
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        limit: usize,
    ) -> BoxFuture<'a, FetchOutcome<Vec<Snapshot>>> {
        Box::pin(async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            let now = Utc::now();
            let points = (0..limit as i64)
                .map(|i| {
                    Snapshot::new(
                        symbol.clone(),
                        now - ChronoDuration::seconds(limit as i64 - i),
                        self.history.price,
                        self.history.volume,
                        "history",
                    )
                })
                .collect();
            FetchOutcome::Success(points)
        })
    }
}
