//! Ranked provider chain with per-provider budgets and fallback.
//!
//! Every data kind (quote, history, order book) walks providers in
//! configured order. Providers that do not serve the kind are passed over;
//! a provider whose budget is exhausted is skipped without being called;
//! any non-success outcome moves on to the next provider. The client never
//! blocks waiting for budget.

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::{FailureKind, ProviderFailure, SourceError, SourceResult};
use crate::http::HttpQuoteProvider;
use crate::provider::{BoxFuture, DataKind, DynQuoteProvider, FetchOutcome, QuoteProvider};
use crate::rate_limiter::RateLimiter;
use crate::simulated::SimulatedProvider;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use surveil_core::{OrderBook, Snapshot, Symbol};
use surveil_telemetry::Metrics;
use tracing::{debug, info, warn};

/// Seed used by simulated providers without an explicit one.
const DEFAULT_SIM_SEED: u64 = 42;

#[derive(Debug, Default)]
struct ProviderCounters {
    requests: AtomicU64,
    successes: AtomicU64,
    rate_limited: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of one provider's usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderUsage {
    pub provider: String,
    /// Calls actually made to the provider.
    pub requests: u64,
    pub successes: u64,
    /// Provider-reported limits plus local budget refusals.
    pub rate_limited: u64,
    pub errors: u64,
    pub budget_remaining: u32,
}

struct ProviderSlot {
    provider: DynQuoteProvider,
    limiter: RateLimiter,
    counters: ProviderCounters,
}

impl ProviderSlot {
    fn id(&self) -> &str {
        self.provider.id()
    }

    fn fail(&self, kind: FailureKind, detail: Option<String>) -> ProviderFailure {
        match kind {
            FailureKind::BudgetExhausted | FailureKind::RateLimited => {
                self.counters.rate_limited.fetch_add(1, Ordering::Relaxed);
            }
            _ => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
            }
        }
        Metrics::fetch_outcome(self.id(), kind.as_str());
        ProviderFailure {
            provider: self.id().to_string(),
            kind,
            detail,
        }
    }
}

/// One kind of provider call and the checks its payload must pass.
trait SourceRequest: Send + Sync {
    type Output: Send;
    const KIND: DataKind;

    fn call<'a>(
        &'a self,
        provider: &'a dyn QuoteProvider,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, FetchOutcome<Self::Output>>;

    /// Validate (and normalize) a successful payload for `symbol`.
    fn check(output: &mut Self::Output, symbol: &Symbol) -> Result<(), String>;
}

fn check_snapshot(snapshot: &Snapshot, symbol: &Symbol) -> Result<(), String> {
    if &snapshot.symbol != symbol {
        return Err(format!("returned symbol {}", snapshot.symbol));
    }
    snapshot.validate().map_err(|e| e.to_string())
}

struct QuoteRequest;

impl SourceRequest for QuoteRequest {
    type Output = Snapshot;
    const KIND: DataKind = DataKind::Quote;

    fn call<'a>(
        &'a self,
        provider: &'a dyn QuoteProvider,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, FetchOutcome<Snapshot>> {
        provider.fetch(symbol)
    }

    fn check(output: &mut Snapshot, symbol: &Symbol) -> Result<(), String> {
        check_snapshot(output, symbol)
    }
}

struct HistoryRequest {
    limit: usize,
}

impl SourceRequest for HistoryRequest {
    type Output = Vec<Snapshot>;
    const KIND: DataKind = DataKind::History;

    fn call<'a>(
        &'a self,
        provider: &'a dyn QuoteProvider,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, FetchOutcome<Vec<Snapshot>>> {
        provider.fetch_history(symbol, self.limit)
    }

    fn check(output: &mut Vec<Snapshot>, symbol: &Symbol) -> Result<(), String> {
        for snapshot in output.iter() {
            check_snapshot(snapshot, symbol)?;
        }
        output.sort_by_key(|s| s.timestamp);
        Ok(())
    }
}

struct BookRequest {
    depth: usize,
}

impl SourceRequest for BookRequest {
    type Output = OrderBook;
    const KIND: DataKind = DataKind::OrderBook;

    fn call<'a>(
        &'a self,
        provider: &'a dyn QuoteProvider,
        symbol: &'a Symbol,
    ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
        provider.fetch_order_book(symbol, self.depth)
    }

    fn check(output: &mut OrderBook, symbol: &Symbol) -> Result<(), String> {
        if &output.symbol != symbol {
            return Err(format!("returned book for {}", output.symbol));
        }
        output.validate().map_err(|e| e.to_string())
    }
}

/// Multi-provider quote client.
pub struct SourceClient {
    slots: Vec<ProviderSlot>,
    fetch_timeout: Duration,
}

impl SourceClient {
    /// Create an empty client. Add providers with [`SourceClient::with_provider`].
    pub fn new(fetch_timeout: Duration) -> Self {
        Self {
            slots: Vec::new(),
            fetch_timeout,
        }
    }

    /// Append a provider at the lowest priority.
    pub fn with_provider(mut self, provider: DynQuoteProvider, limiter: RateLimiter) -> Self {
        self.slots.push(ProviderSlot {
            provider,
            limiter,
            counters: ProviderCounters::default(),
        });
        self
    }

    /// Build the provider chain from configuration, in order.
    pub fn from_configs(configs: &[ProviderConfig], fetch_timeout: Duration) -> SourceResult<Self> {
        if configs.is_empty() {
            return Err(SourceError::Config("at least one provider is required".to_string()));
        }

        let mut client = Self::new(fetch_timeout);
        for cfg in configs {
            cfg.validate().map_err(SourceError::Config)?;
            let provider: DynQuoteProvider = match cfg.kind {
                ProviderKind::Http => {
                    let base_url = cfg.base_url.clone().unwrap_or_default();
                    Arc::new(HttpQuoteProvider::new(&cfg.id, base_url, cfg.api_key.clone())?)
                }
                ProviderKind::Simulated => Arc::new(SimulatedProvider::new(
                    &cfg.id,
                    cfg.seed.unwrap_or(DEFAULT_SIM_SEED),
                )),
            };
            info!(
                provider = %cfg.id,
                kind = ?cfg.kind,
                max_requests = cfg.max_requests,
                window_secs = cfg.window_secs,
                "Registered quote provider"
            );
            client = client.with_provider(provider, RateLimiter::new(cfg.max_requests, cfg.window_secs));
        }
        Ok(client)
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.id().to_string()).collect()
    }

    /// Whether any provider serves `kind`.
    pub fn serves(&self, kind: DataKind) -> bool {
        self.slots.iter().any(|s| s.provider.supports(kind))
    }

    /// Fetch a snapshot, falling back across providers.
    ///
    /// Fails with `SourceUnavailable` listing every provider's failure when
    /// no provider produced a valid snapshot.
    pub async fn fetch(&self, symbol: &Symbol) -> SourceResult<Snapshot> {
        self.fetch_with(symbol, &QuoteRequest).await
    }

    /// Fetch up to `limit` recent snapshots, oldest first.
    pub async fn fetch_history(&self, symbol: &Symbol, limit: usize) -> SourceResult<Vec<Snapshot>> {
        self.fetch_with(symbol, &HistoryRequest { limit }).await
    }

    /// Fetch up to `depth` order book levels per side.
    pub async fn fetch_order_book(&self, symbol: &Symbol, depth: usize) -> SourceResult<OrderBook> {
        self.fetch_with(symbol, &BookRequest { depth }).await
    }

    /// Fetch a snapshot and attach order book depth when a provider serves it.
    ///
    /// A missing or inconsistent book leaves the plain snapshot; only the
    /// quote fetch can fail the call.
    pub async fn fetch_with_book(&self, symbol: &Symbol, depth: usize) -> SourceResult<Snapshot> {
        let snapshot = self.fetch(symbol).await?;
        if depth == 0 || !self.serves(DataKind::OrderBook) {
            return Ok(snapshot);
        }
        match self.fetch_order_book(symbol, depth).await {
            Ok(book) => {
                let enriched = snapshot.clone().with_book(&book);
                match enriched.validate() {
                    Ok(()) => Ok(enriched),
                    Err(e) => {
                        debug!(symbol = %symbol, error = %e, "Order book inconsistent with quote, ignored");
                        Ok(snapshot)
                    }
                }
            }
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "Order book unavailable, using plain quote");
                Ok(snapshot)
            }
        }
    }

    async fn fetch_with<R: SourceRequest>(&self, symbol: &Symbol, request: &R) -> SourceResult<R::Output> {
        let mut attempts = Vec::with_capacity(self.slots.len());
        let mut served = false;

        for slot in &self.slots {
            if !slot.provider.supports(R::KIND) {
                continue;
            }
            served = true;
            if !slot.limiter.try_acquire() {
                debug!(provider = %slot.id(), symbol = %symbol, kind = %R::KIND, "Provider budget exhausted, falling back");
                attempts.push(slot.fail(FailureKind::BudgetExhausted, None));
                continue;
            }
            slot.counters.requests.fetch_add(1, Ordering::Relaxed);
            Metrics::provider_budget(slot.id(), slot.limiter.remaining_capacity());

            let call = request.call(slot.provider.as_ref(), symbol);
            let outcome = match tokio::time::timeout(self.fetch_timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(provider = %slot.id(), symbol = %symbol, kind = %R::KIND, timeout_ms = self.fetch_timeout.as_millis() as u64, "Provider call timed out");
                    attempts.push(slot.fail(FailureKind::Timeout, None));
                    continue;
                }
            };

            let failure = match outcome {
                FetchOutcome::Success(mut output) => match R::check(&mut output, symbol) {
                    Ok(()) => {
                        slot.counters.successes.fetch_add(1, Ordering::Relaxed);
                        Metrics::fetch_outcome(slot.id(), "success");
                        return Ok(output);
                    }
                    Err(reason) => slot.fail(FailureKind::Malformed, Some(reason)),
                },
                FetchOutcome::RateLimited => slot.fail(FailureKind::RateLimited, None),
                FetchOutcome::NotFound => slot.fail(FailureKind::NotFound, None),
                FetchOutcome::Transient(reason) => slot.fail(FailureKind::Transient, Some(reason)),
                FetchOutcome::Malformed(reason) => slot.fail(FailureKind::Malformed, Some(reason)),
                FetchOutcome::Unsupported => slot.fail(FailureKind::Unsupported, None),
            };
            debug!(symbol = %symbol, kind = %R::KIND, failure = %failure, "Provider failed, falling back");
            attempts.push(failure);
        }

        if !served {
            return Err(SourceError::Unsupported(R::KIND));
        }
        Metrics::source_unavailable(symbol.as_str());
        Err(SourceError::SourceUnavailable {
            symbol: symbol.clone(),
            attempts,
        })
    }

    /// Snapshot of every provider's counters, in priority order.
    pub fn usage(&self) -> Vec<ProviderUsage> {
        self.slots
            .iter()
            .map(|slot| ProviderUsage {
                provider: slot.id().to_string(),
                requests: slot.counters.requests.load(Ordering::Relaxed),
                successes: slot.counters.successes.load(Ordering::Relaxed),
                rate_limited: slot.counters.rate_limited.load(Ordering::Relaxed),
                errors: slot.counters.errors.load(Ordering::Relaxed),
                budget_remaining: slot.limiter.remaining_capacity(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;
    use surveil_core::BookLevel;

    /// Provider that always returns the same outcome.
    struct FixedProvider {
        id: String,
        outcome: FetchOutcome,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(id: &str, outcome: FetchOutcome) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                outcome,
                delay: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn slow(id: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                outcome: FetchOutcome::Success(snap(id)),
                delay: Some(delay),
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl QuoteProvider for FixedProvider {
        fn id(&self) -> &str {
            &self.id
        }

        fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                match &self.outcome {
                    FetchOutcome::Success(s) => {
                        let mut s = s.clone();
                        s.symbol = symbol.clone();
                        FetchOutcome::Success(s)
                    }
                    other => other.clone(),
                }
            })
        }
    }

    fn snap(source: &str) -> Snapshot {
        Snapshot::new(Symbol::new("XYZ"), Utc::now(), dec!(10), dec!(100), source)
    }

    fn client() -> SourceClient {
        SourceClient::new(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_falls_back_from_rate_limited_provider() {
        let a = FixedProvider::new("A", FetchOutcome::RateLimited);
        let b = FixedProvider::new("B", FetchOutcome::Success(snap("B")));
        let client = client()
            .with_provider(a.clone(), RateLimiter::new(100, 60))
            .with_provider(b.clone(), RateLimiter::new(100, 60));

        let result = client.fetch(&Symbol::new("XYZ")).await.unwrap();
        assert_eq!(result.source, "B");

        let usage = client.usage();
        assert_eq!(usage[0].rate_limited, 1);
        assert_eq!(usage[1].successes, 1);
    }

    #[tokio::test]
    async fn test_exhausted_budget_skips_provider_without_calling() {
        let a = FixedProvider::new("A", FetchOutcome::Success(snap("A")));
        let b = FixedProvider::new("B", FetchOutcome::Success(snap("B")));
        let client = client()
            .with_provider(a.clone(), RateLimiter::new(1, 60))
            .with_provider(b.clone(), RateLimiter::new(100, 60));

        let sym = Symbol::new("XYZ");
        assert_eq!(client.fetch(&sym).await.unwrap().source, "A");
        assert_eq!(client.fetch(&sym).await.unwrap().source, "B");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.usage()[0].requests, 1);
    }

    #[tokio::test]
    async fn test_all_failing_lists_each_provider() {
        let a = FixedProvider::new("A", FetchOutcome::Transient("503".to_string()));
        let b = FixedProvider::new("B", FetchOutcome::NotFound);
        let client = client()
            .with_provider(a, RateLimiter::new(100, 60))
            .with_provider(b, RateLimiter::new(100, 60));

        let err = client.fetch(&Symbol::new("XYZ")).await.unwrap_err();
        match err {
            SourceError::SourceUnavailable { symbol, attempts } => {
                assert_eq!(symbol, Symbol::new("XYZ"));
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].kind, FailureKind::Transient);
                assert_eq!(attempts[1].kind, FailureKind::NotFound);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_transient_and_falls_back() {
        let slow = FixedProvider::slow("slow", Duration::from_secs(5));
        let fast = FixedProvider::new("fast", FetchOutcome::Success(snap("fast")));
        let client = SourceClient::new(Duration::from_millis(20))
            .with_provider(slow, RateLimiter::new(100, 60))
            .with_provider(fast, RateLimiter::new(100, 60));

        let result = client.fetch(&Symbol::new("XYZ")).await.unwrap();
        assert_eq!(result.source, "fast");
        assert_eq!(client.usage()[0].errors, 1);
    }

    #[tokio::test]
    async fn test_invalid_snapshot_treated_as_malformed() {
        let mut bad = snap("A");
        bad.price = dec!(0);
        let a = FixedProvider::new("A", FetchOutcome::Success(bad));
        let b = FixedProvider::new("B", FetchOutcome::Success(snap("B")));
        let client = client()
            .with_provider(a, RateLimiter::new(100, 60))
            .with_provider(b, RateLimiter::new(100, 60));

        assert_eq!(client.fetch(&Symbol::new("XYZ")).await.unwrap().source, "B");
        assert_eq!(client.usage()[0].errors, 1);
    }

    /// Serves history and order books besides quotes.
    struct DepthProvider {
        history_calls: AtomicUsize,
    }

    impl DepthProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                history_calls: AtomicUsize::new(0),
            })
        }
    }

    impl QuoteProvider for DepthProvider {
        fn id(&self) -> &str {
            "depth"
        }

        fn supports(&self, _kind: DataKind) -> bool {
            true
        }

        fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
            Box::pin(async move {
                let mut s = snap("depth");
                s.symbol = symbol.clone();
                FetchOutcome::Success(s)
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
                // Newest first, to exercise normalization.
                let points = (0..limit as i64)
                    .map(|i| {
                        Snapshot::new(
                            symbol.clone(),
                            now - chrono::Duration::seconds(i),
                            dec!(10),
                            dec!(100),
                            "depth",
                        )
                    })
                    .collect();
                FetchOutcome::Success(points)
            })
        }

        fn fetch_order_book<'a>(
            &'a self,
            symbol: &'a Symbol,
            _depth: usize,
        ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
            Box::pin(async move {
                FetchOutcome::Success(OrderBook::new(
                    symbol.clone(),
                    Utc::now(),
                    vec![BookLevel::new(dec!(10), dec!(300))],
                    vec![BookLevel::new(dec!(10), dec!(100))],
                    "depth",
                ))
            })
        }
    }

    #[tokio::test]
    async fn test_history_skips_providers_without_history() {
        let quotes = FixedProvider::new("A", FetchOutcome::Success(snap("A")));
        let depth = DepthProvider::new();
        let client = client()
            .with_provider(quotes, RateLimiter::new(100, 60))
            .with_provider(depth.clone(), RateLimiter::new(100, 60));

        let history = client.fetch_history(&Symbol::new("XYZ"), 5).await.unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(depth.history_calls.load(Ordering::SeqCst), 1);

        // The quote-only provider was neither called nor charged.
        let usage = client.usage();
        assert_eq!(usage[0].requests, 0);
        assert_eq!(usage[0].budget_remaining, 100);
    }

    #[tokio::test]
    async fn test_no_provider_serving_kind_is_unsupported() {
        let client = client().with_provider(
            FixedProvider::new("A", FetchOutcome::Success(snap("A"))),
            RateLimiter::new(100, 60),
        );
        let sym = Symbol::new("XYZ");
        assert!(!client.serves(DataKind::OrderBook));
        assert!(matches!(
            client.fetch_history(&sym, 5).await,
            Err(SourceError::Unsupported(DataKind::History))
        ));

        // Plain quotes still work when books are requested.
        let s = client.fetch_with_book(&sym, 10).await.unwrap();
        assert_eq!(s.imbalance_pct(), None);
    }

    #[tokio::test]
    async fn test_fetch_with_book_attaches_depth() {
        let client = client().with_provider(DepthProvider::new(), RateLimiter::new(100, 60));
        let s = client.fetch_with_book(&Symbol::new("XYZ"), 10).await.unwrap();
        assert_eq!(s.imbalance_pct(), Some(dec!(50)));
        assert_eq!(s.bid, Some(dec!(10)));
        assert_eq!(client.usage()[0].requests, 2);
    }

    #[tokio::test]
    async fn test_book_for_wrong_symbol_is_malformed() {
        struct WrongBook;

        impl QuoteProvider for WrongBook {
            fn id(&self) -> &str {
                "wrong"
            }

            fn supports(&self, kind: DataKind) -> bool {
                kind == DataKind::OrderBook
            }

            fn fetch<'a>(&'a self, _symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome> {
                Box::pin(async { FetchOutcome::Unsupported })
            }

            fn fetch_order_book<'a>(
                &'a self,
                _symbol: &'a Symbol,
                _depth: usize,
            ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
                Box::pin(async {
                    FetchOutcome::Success(OrderBook::new(
                        Symbol::new("OTHER"),
                        Utc::now(),
                        vec![BookLevel::new(dec!(1), dec!(1))],
                        vec![BookLevel::new(dec!(2), dec!(1))],
                        "wrong",
                    ))
                })
            }
        }

        let client = client().with_provider(Arc::new(WrongBook), RateLimiter::new(100, 60));
        let err = client
            .fetch_order_book(&Symbol::new("XYZ"), 10)
            .await
            .unwrap_err();
        match err {
            SourceError::SourceUnavailable { attempts, .. } => {
                assert_eq!(attempts[0].kind, FailureKind::Malformed);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_from_configs_requires_providers() {
        assert!(SourceClient::from_configs(&[], Duration::from_secs(1)).is_err());

        let client = SourceClient::from_configs(
            &[ProviderConfig::simulated("sim")],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.provider_ids(), vec!["sim".to_string()]);
    }
}
