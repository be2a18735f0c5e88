//! Market data acquisition for the surveillance pipeline.
//!
//! Provides:
//! - A ranked provider chain with automatic fallback
//! - Quote, history and order-book requests over the same chain
//! - Per-provider sliding-window request budgets
//! - HTTP and simulated providers

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod provider;
pub mod rate_limiter;
pub mod simulated;

pub use client::{ProviderUsage, SourceClient};
pub use config::{ProviderConfig, ProviderKind};
pub use error::{FailureKind, ProviderFailure, SourceError, SourceResult};
pub use http::HttpQuoteProvider;
pub use provider::{BoxFuture, DataKind, DynQuoteProvider, FetchOutcome, QuoteProvider};
pub use rate_limiter::RateLimiter;
pub use simulated::SimulatedProvider;
