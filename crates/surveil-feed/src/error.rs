//! Feed error types.

use chrono::{DateTime, Utc};
use surveil_core::{CoreError, Symbol};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Out-of-order snapshot for {symbol}: {got} is older than newest {newest}")]
    OutOfOrder {
        symbol: Symbol,
        newest: DateTime<Utc>,
        got: DateTime<Utc>,
    },

    #[error("Snapshot for {got} pushed to series {expected}")]
    SymbolMismatch { expected: Symbol, got: Symbol },

    #[error("Malformed snapshot: {0}")]
    Malformed(#[from] CoreError),
}

impl FeedError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::OutOfOrder { .. } => "out_of_order",
            Self::SymbolMismatch { .. } => "symbol_mismatch",
            Self::Malformed(_) => "malformed",
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
