//! Main application orchestration.
//!
//! Wires the components together:
//! - Source client (ranked providers with request budgets)
//! - Startup history backfill into the symbol cache
//! - Scheduler feeding a bounded queue
//! - Single consumer: cache, detector, alert engine
//! - Persistence sink and notifiers

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::monitor::MonitorHandle;
use crate::notify::DynNotifier;
use crate::pipeline::{Housekeeping, Pipeline, PipelineStats};
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
use std::sync::Arc;
use surveil_alert::{AlertEngine, AlertLog};
use surveil_core::Symbol;
use surveil_detector::{AnomalyDetector, ModelRegistry};
use surveil_feed::SymbolCache;
use surveil_persistence::DynPersistenceSink;
use surveil_source::{DataKind, SourceClient};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters from a completed run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    /// History points seeded into the cache before the first tick.
    pub backfilled: usize,
    pub scheduler: SchedulerStats,
    pub pipeline: PipelineStats,
}

/// Main application.
pub struct Application {
    config: AppConfig,
    watchlist: Vec<Symbol>,
    client: Arc<SourceClient>,
    cache: Arc<SymbolCache>,
    log: Arc<AlertLog>,
    registry: Arc<ModelRegistry>,
    sink: DynPersistenceSink,
    notifiers: Vec<DynNotifier>,
    cancel: CancellationToken,
}

impl Application {
    /// Build the application from validated configuration.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let client = SourceClient::from_configs(&config.providers, config.fetch_timeout())?;
        Self::build(config, client)
    }

    /// Build with a pre-assembled source client (custom providers).
    ///
    /// The configured `providers` section is ignored.
    pub fn with_source_client(config: AppConfig, client: SourceClient) -> AppResult<Self> {
        config.validate_pipeline()?;
        Self::build(config, client)
    }

    fn build(config: AppConfig, client: SourceClient) -> AppResult<Self> {
        let watchlist = config.symbols()?;
        let sink = config.persistence.build_sink()?;
        let notifiers = config
            .notifiers
            .iter()
            .map(|n| n.build())
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            symbols = ?watchlist.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            providers = ?client.provider_ids(),
            rules = config.alerts.rules.len(),
            notifiers = notifiers.len(),
            backend = ?config.persistence.backend,
            "Application configured"
        );

        Ok(Self {
            cache: Arc::new(SymbolCache::new(config.cache.clone())),
            log: Arc::new(AlertLog::new()),
            registry: Arc::new(ModelRegistry::new()),
            client: Arc::new(client),
            config,
            watchlist,
            sink,
            notifiers,
            cancel: CancellationToken::new(),
        })
    }

    /// Read handle for presentation layers.
    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.log),
            Arc::clone(&self.sink),
            Arc::clone(&self.client),
        )
    }

    /// Token that stops the run when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.cancel.cancel();
    }

    /// Seed each symbol's series with recent provider history.
    ///
    /// Skipped when backfill is disabled or no provider serves history.
    /// A symbol whose history cannot be fetched starts empty. Returns the
    /// number of points cached.
    pub async fn backfill(&self) -> usize {
        let limit = self
            .config
            .history_backfill
            .min(self.config.cache.max_points);
        if limit == 0 || !self.client.serves(DataKind::History) {
            return 0;
        }

        let mut seeded = 0;
        for symbol in &self.watchlist {
            if self.cancel.is_cancelled() {
                break;
            }
            let points = match self.client.fetch_history(symbol, limit).await {
                Ok(points) => points,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "History backfill failed");
                    continue;
                }
            };
            let mut accepted = 0;
            for snapshot in points {
                match self.cache.update(snapshot) {
                    Ok(_) => accepted += 1,
                    Err(e) => debug!(symbol = %symbol, error = %e, "Backfill point rejected"),
                }
            }
            info!(symbol = %symbol, points = accepted, "History backfilled");
            seeded += accepted;
        }
        seeded
    }

    /// Run until shutdown is requested or Ctrl-C is received.
    ///
    /// On shutdown the scheduler stops dispatching and drains in-flight
    /// fetches; the consumer applies every queued item before returning.
    pub async fn run(self) -> AppResult<RunReport> {
        let backfilled = self.backfill().await;
        let engine = AlertEngine::with_log(self.config.alerts.clone(), Arc::clone(&self.log))?;
        let detector =
            AnomalyDetector::with_registry(self.config.detector.clone(), Arc::clone(&self.registry));
        let pipeline = Pipeline::new(
            Arc::clone(&self.cache),
            detector,
            engine,
            Arc::clone(&self.sink),
            self.notifiers.clone(),
        );
        let housekeeping = Housekeeping {
            interval: self.config.persistence.retention_interval(),
            retention: self.config.persistence.retention,
        };

        let (tx, rx) = mpsc::channel(self.config.queue_capacity);
        let scheduler = Scheduler::new(
            SchedulerConfig {
                polling_interval: self.config.polling_interval(),
                pool_size: self.config.pool_size,
                shutdown_grace: self.config.shutdown_grace(),
                book_depth: self.config.order_book_depth,
            },
            Arc::clone(&self.client),
            self.watchlist.clone(),
            tx,
            self.cancel.clone(),
        );

        let consumer = tokio::spawn(pipeline.run(rx, housekeeping));
        let producer = tokio::spawn(scheduler.run());

        let cancel = self.cancel.clone();
        let signal_listener = tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        cancel.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                },
                _ = cancel.cancelled() => {}
            }
        });

        info!("Surveillance running");
        let scheduler_stats = producer
            .await
            .map_err(|e| AppError::Task(format!("scheduler: {e}")))?;
        let pipeline_stats = consumer
            .await
            .map_err(|e| AppError::Task(format!("consumer: {e}")))?;
        signal_listener.abort();

        self.sink.flush()?;
        for usage in self.client.usage() {
            info!(
                provider = %usage.provider,
                requests = usage.requests,
                successes = usage.successes,
                rate_limited = usage.rate_limited,
                errors = usage.errors,
                "Provider usage"
            );
        }
        let summary = self.log.summary();
        info!(
            alerts = summary.total,
            unacknowledged = summary.unacknowledged,
            ticks = scheduler_stats.ticks,
            processed = pipeline_stats.processed,
            "Shutdown complete"
        );

        Ok(RunReport {
            backfilled,
            scheduler: scheduler_stats,
            pipeline: pipeline_stats,
        })
    }
}
