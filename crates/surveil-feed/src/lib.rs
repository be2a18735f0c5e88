//! In-memory time-series cache for the surveillance pipeline.
//!
//! Holds a bounded, timestamp-ordered history of snapshots per symbol.
//! Written by the single pipeline consumer, read through copies.

pub mod cache;
pub mod config;
pub mod error;
pub mod series;

pub use cache::SymbolCache;
pub use config::CacheConfig;
pub use error::{FeedError, FeedResult};
pub use series::SymbolSeries;
