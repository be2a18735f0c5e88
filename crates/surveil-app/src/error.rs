//! Application error types.

use crate::notify::NotifyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] surveil_core::CoreError),

    #[error("Source error: {0}")]
    Source(#[from] surveil_source::SourceError),

    #[error("Feed error: {0}")]
    Feed(#[from] surveil_feed::FeedError),

    #[error("Detector error: {0}")]
    Detector(#[from] surveil_detector::DetectorError),

    #[error("Alert error: {0}")]
    Alert(#[from] surveil_alert::AlertError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] surveil_persistence::PersistenceError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] surveil_telemetry::TelemetryError),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
