//! Instrument identifiers.
//!
//! Symbols are normalized on construction (trimmed, upper-cased) so that
//! `"aapl "` and `"AAPL"` address the same series, cooldown and rule.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted symbol length after normalization.
pub const MAX_SYMBOL_LEN: usize = 16;

/// Normalized instrument symbol (e.g. "AAPL", "BRK.B").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a symbol, normalizing case and whitespace without validation.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    /// Parse and validate a symbol.
    ///
    /// Accepts ASCII letters, digits, `.` and `-`. Rejects empty input and
    /// anything longer than [`MAX_SYMBOL_LEN`].
    pub fn parse(raw: &str) -> Result<Self> {
        let symbol = Self::new(raw);
        if symbol.0.is_empty() {
            return Err(CoreError::InvalidSymbol("empty symbol".to_string()));
        }
        if symbol.0.len() > MAX_SYMBOL_LEN {
            return Err(CoreError::InvalidSymbol(format!(
                "{} exceeds {MAX_SYMBOL_LEN} characters",
                symbol.0
            )));
        }
        if let Some(bad) = symbol
            .0
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '-'))
        {
            return Err(CoreError::InvalidSymbol(format!(
                "{} contains invalid character {bad:?}",
                symbol.0
            )));
        }
        Ok(symbol)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
