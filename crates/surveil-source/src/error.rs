//! Source client error types.

use crate::provider::DataKind;
use std::fmt;
use surveil_core::Symbol;
use thiserror::Error;

/// Why a single provider did not yield a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Local sliding-window budget was exhausted; provider not called.
    BudgetExhausted,
    /// Provider reported rate limiting.
    RateLimited,
    NotFound,
    Transient,
    Malformed,
    /// Call exceeded the fetch timeout.
    Timeout,
    /// Provider claimed support but did not serve the data kind.
    Unsupported,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetExhausted => "budget_exhausted",
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Transient => "transient",
            Self::Malformed => "malformed",
            Self::Timeout => "timeout",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider's failure within a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub kind: FailureKind,
    pub detail: Option<String>,
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}={} ({detail})", self.provider, self.kind),
            None => write!(f, "{}={}", self.provider, self.kind),
        }
    }
}

fn join_failures(attempts: &[ProviderFailure]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source unavailable for {symbol}: [{}]", join_failures(.attempts))]
    SourceUnavailable {
        symbol: Symbol,
        attempts: Vec<ProviderFailure>,
    },

    #[error("No provider serves {0} data")]
    Unsupported(DataKind),

    #[error("Invalid provider config: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type SourceResult<T> = Result<T, SourceError>;
