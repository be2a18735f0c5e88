//! Detector error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Empty history")]
    EmptyHistory,

    #[error("Not enough data to fit model: have {have}, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("Refit task failed: {0}")]
    Refit(String),
}

pub type DetectorResult<T> = Result<T, DetectorError>;
