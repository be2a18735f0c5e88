//! Quote provider abstraction.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use surveil_core::{OrderBook, Snapshot, Symbol};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Kind of market data a provider can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    /// Latest price/volume snapshot.
    Quote,
    /// Recent snapshots, oldest first.
    History,
    /// Level-2 bid/ask depth.
    OrderBook,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::History => "history",
            Self::OrderBook => "order_book",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T = Snapshot> {
    Success(T),
    /// Provider refused the request due to its own rate limit.
    RateLimited,
    /// Network or server failure; another provider may succeed.
    Transient(String),
    /// Provider does not know the symbol.
    NotFound,
    /// Response could not be decoded into valid data.
    Malformed(String),
    /// Provider does not serve this kind of data.
    Unsupported,
}

impl<T> FetchOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Transform the success payload, keeping failures.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            Self::Success(v) => FetchOutcome::Success(f(v)),
            Self::RateLimited => FetchOutcome::RateLimited,
            Self::Transient(reason) => FetchOutcome::Transient(reason),
            Self::NotFound => FetchOutcome::NotFound,
            Self::Malformed(reason) => FetchOutcome::Malformed(reason),
            Self::Unsupported => FetchOutcome::Unsupported,
        }
    }
}

impl<T> fmt::Display for FetchOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success(_) => f.write_str("success"),
            Self::RateLimited => f.write_str("rate_limited"),
            Self::Transient(reason) => write!(f, "transient({reason})"),
            Self::NotFound => f.write_str("not_found"),
            Self::Malformed(reason) => write!(f, "malformed({reason})"),
            Self::Unsupported => f.write_str("unsupported"),
        }
    }
}

/// External market-data provider.
///
/// Implementations classify every failure into a [`FetchOutcome`] variant
/// instead of returning errors; the source client decides what to do next.
/// Only `fetch` is required; history and order book default to unsupported.
pub trait QuoteProvider: Send + Sync {
    /// Stable provider identifier.
    fn id(&self) -> &str;

    /// Whether this provider serves `kind`. Unsupported providers are
    /// skipped without spending budget.
    fn supports(&self, kind: DataKind) -> bool {
        kind == DataKind::Quote
    }

    /// Fetch the latest snapshot for a symbol.
    fn fetch<'a>(&'a self, symbol: &'a Symbol) -> BoxFuture<'a, FetchOutcome>;

    /// Fetch up to `limit` recent snapshots, oldest first.
    fn fetch_history<'a>(
        &'a self,
        _symbol: &'a Symbol,
        _limit: usize,
    ) -> BoxFuture<'a, FetchOutcome<Vec<Snapshot>>> {
        Box::pin(async { FetchOutcome::Unsupported })
    }

    /// Fetch up to `depth` levels per side of the order book.
    fn fetch_order_book<'a>(
        &'a self,
        _symbol: &'a Symbol,
        _depth: usize,
    ) -> BoxFuture<'a, FetchOutcome<OrderBook>> {
        Box::pin(async { FetchOutcome::Unsupported })
    }
}

/// Arc wrapper for QuoteProvider trait objects.
pub type DynQuoteProvider = Arc<dyn QuoteProvider>;
