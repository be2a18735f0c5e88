//! Market surveillance pipeline.
//!
//! Main application that orchestrates all components:
//! - Ingestion scheduler and bounded fetch queue
//! - Single-consumer cache update, detection and alerting
//! - Alert persistence and notification fan-out
//! - Read handle for presentation layers

pub mod app;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

pub use app::{Application, RunReport};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use monitor::MonitorHandle;
pub use notify::{DynNotifier, LogNotifier, Notifier, NotifierConfig, NotifyError, WebhookNotifier};
pub use pipeline::{ItemOutcome, Pipeline, PipelineStats};
pub use scheduler::{FetchItem, Scheduler, SchedulerConfig, SchedulerStats};
