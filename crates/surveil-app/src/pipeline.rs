//! Single-consumer processing pipeline.
//!
//! The consumer is the only writer of the symbol cache, detector state and
//! alert cooldowns. Per item it runs: cache update, detection, alert
//! evaluation, then persistence and notification. An error while handling
//! one item is logged and never affects the next.
//!
//! Detection reads only the newest points it scores, except when a model
//! refit is due. Sink appends are buffered; retention passes scan and delete
//! files, so they run on the blocking pool.

use crate::notify::{self, DynNotifier};
use crate::scheduler::FetchItem;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use surveil_alert::AlertEngine;
use surveil_core::{Alert, DetectionResult, Snapshot, Symbol};
use surveil_detector::{spawn_refit, AnomalyDetector, SpikeThresholds};
use surveil_feed::SymbolCache;
use surveil_persistence::{DynPersistenceSink, RetentionPolicy};
use surveil_telemetry::Metrics;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Result of handling one queue item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Source could not provide a snapshot this tick.
    Unavailable,
    /// Snapshot rejected by the cache (malformed or out of order).
    Rejected,
    /// Snapshot cached but could not be evaluated.
    DetectionFailed,
    Processed {
        detection: DetectionResult,
        alerts: Vec<Alert>,
    },
}

/// Counters reported when the consumer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub received: u64,
    pub processed: u64,
    pub unavailable: u64,
    pub rejected: u64,
    pub detection_failures: u64,
    pub alerts: u64,
    pub refits: u64,
}

impl PipelineStats {
    fn record(&mut self, outcome: &ItemOutcome) {
        self.received += 1;
        match outcome {
            ItemOutcome::Unavailable => self.unavailable += 1,
            ItemOutcome::Rejected => self.rejected += 1,
            ItemOutcome::DetectionFailed => self.detection_failures += 1,
            ItemOutcome::Processed { alerts, .. } => {
                self.processed += 1;
                self.alerts += alerts.len() as u64;
            }
        }
    }
}

/// Periodic maintenance performed by the consumer between items.
#[derive(Debug, Clone)]
pub struct Housekeeping {
    pub interval: Duration,
    pub retention: RetentionPolicy,
}

/// Consumer-side processing state.
pub struct Pipeline {
    cache: Arc<SymbolCache>,
    detector: AnomalyDetector,
    engine: AlertEngine,
    sink: DynPersistenceSink,
    notifiers: Vec<DynNotifier>,
    thresholds: HashMap<Symbol, SpikeThresholds>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        cache: Arc<SymbolCache>,
        detector: AnomalyDetector,
        engine: AlertEngine,
        sink: DynPersistenceSink,
        notifiers: Vec<DynNotifier>,
    ) -> Self {
        Self {
            cache,
            detector,
            engine,
            sink,
            notifiers,
            thresholds: HashMap::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Drain the queue until every sender is dropped, then flush the sink.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<FetchItem>,
        housekeeping: Housekeeping,
    ) -> PipelineStats {
        let mut maintenance = tokio::time::interval(housekeeping.interval);
        maintenance.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; skip it.
        maintenance.tick().await;

        info!("Pipeline consumer started");
        loop {
            tokio::select! {
                biased;
                item = rx.recv() => match item {
                    Some(item) => {
                        self.process(item);
                    }
                    None => break,
                },
                _ = maintenance.tick() => self.housekeep(&housekeeping.retention),
            }
        }

        if let Err(e) = self.sink.flush() {
            error!(error = %e, "Failed to flush persistence sink on shutdown");
            Metrics::persistence_failure("flush");
        }
        info!(
            received = self.stats.received,
            processed = self.stats.processed,
            alerts = self.stats.alerts,
            "Pipeline consumer stopped"
        );
        self.stats
    }

    /// Handle one fetch result.
    pub fn process(&mut self, item: FetchItem) -> ItemOutcome {
        let outcome = match item.result {
            Ok(snapshot) => self.process_snapshot(snapshot),
            Err(e) => {
                warn!(symbol = %item.symbol, error = %e, "Symbol skipped this tick");
                ItemOutcome::Unavailable
            }
        };
        self.stats.record(&outcome);
        outcome
    }

    fn process_snapshot(&mut self, snapshot: Snapshot) -> ItemOutcome {
        let symbol = snapshot.symbol.clone();

        if let Err(e) = self.cache.update(snapshot.clone()) {
            warn!(symbol = %symbol, error = %e, "Snapshot rejected");
            Metrics::snapshot_rejected(symbol.as_str(), e.reason());
            return ItemOutcome::Rejected;
        }

        if let Err(e) = self.sink.append_snapshot(&snapshot) {
            warn!(symbol = %symbol, error = %e, "Failed to persist snapshot");
            Metrics::persistence_failure("snapshot");
        }

        let history = if self.detector.refit_due(&symbol, self.cache.len(&symbol)) {
            self.cache.read(&symbol)
        } else {
            self.cache
                .read_tail(&symbol, self.detector.config().min_history())
        };
        let thresholds = self
            .thresholds
            .entry(symbol.clone())
            .or_insert_with(|| SpikeThresholds::from_rules(self.engine.rules(), &symbol));

        let output = match self.detector.detect(&history, thresholds) {
            Ok(output) => output,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Detection failed");
                return ItemOutcome::DetectionFailed;
            }
        };

        if let Some(job) = output.refit {
            debug!(symbol = %symbol, rows = job.rows.len(), generation = job.generation, "Scheduling model refit");
            spawn_refit(Arc::clone(self.detector.registry()), job);
            self.stats.refits += 1;
        }

        let detection = output.result;
        let alerts = self.engine.evaluate(&detection);
        for alert in &alerts {
            if let Err(e) = self.sink.append_alert(alert) {
                error!(alert_id = %alert.id, error = %e, "Failed to persist alert");
                Metrics::persistence_failure("alert");
            }
            notify::dispatch(&self.notifiers, alert);
        }

        ItemOutcome::Processed { detection, alerts }
    }

    fn housekeep(&mut self, retention: &RetentionPolicy) {
        let pruned = self.engine.prune_cooldowns();
        debug!(pruned_cooldowns = pruned, "Cooldowns pruned");

        let sink = Arc::clone(&self.sink);
        let retention = *retention;
        tokio::task::spawn_blocking(move || match sink.apply_retention(&retention, Utc::now()) {
            Ok(report) => debug!(
                snapshots = report.snapshots,
                alerts = report.alerts,
                "Retention pass complete"
            ),
            Err(e) => {
                warn!(error = %e, "Retention pass failed");
                Metrics::persistence_failure("retention");
            }
        });
    }
}
