//! Read handle for presentation layers.
//!
//! Exposes copies of cache history and the alert log. The only mutation
//! allowed through it is alert acknowledgement.

use crate::error::AppResult;
use chrono::Utc;
use std::sync::Arc;
use surveil_alert::{AlertLog, AlertSummary};
use surveil_core::{Alert, AlertId, Snapshot, Symbol};
use surveil_feed::SymbolCache;
use surveil_persistence::{AlertFilter, DynPersistenceSink};
use surveil_source::{ProviderUsage, SourceClient};
use surveil_telemetry::Metrics;
use tracing::{info, warn};

/// Cloneable view onto the running pipeline.
#[derive(Clone)]
pub struct MonitorHandle {
    cache: Arc<SymbolCache>,
    log: Arc<AlertLog>,
    sink: DynPersistenceSink,
    client: Arc<SourceClient>,
}

impl MonitorHandle {
    pub fn new(
        cache: Arc<SymbolCache>,
        log: Arc<AlertLog>,
        sink: DynPersistenceSink,
        client: Arc<SourceClient>,
    ) -> Self {
        Self {
            cache,
            log,
            sink,
            client,
        }
    }

    /// Recent history for a symbol, oldest first.
    pub fn history(&self, symbol: &Symbol) -> Vec<Snapshot> {
        self.cache.read(symbol)
    }

    pub fn latest(&self, symbol: &Symbol) -> Option<Snapshot> {
        self.cache.latest(symbol)
    }

    /// Symbols with cached data.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.cache.symbols()
    }

    /// Alerts raised during this run, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.log.recent(limit)
    }

    pub fn alert(&self, id: &AlertId) -> Option<Alert> {
        self.log.get(id)
    }

    pub fn alert_summary(&self) -> AlertSummary {
        self.log.summary()
    }

    /// Pretty JSON with every open alert and the newest `limit` alerts.
    pub fn export_alerts(&self, limit: usize) -> AppResult<String> {
        let export = self.log.export(limit, Utc::now());
        info!(
            unacknowledged = export.unacknowledged.len(),
            recent = export.recent.len(),
            "Alerts exported"
        );
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Acknowledge an alert.
    ///
    /// Returns false if it was already acknowledged. The acknowledgement is
    /// also written to the persistence sink; a sink failure is logged but
    /// does not undo the in-memory acknowledgement.
    pub fn acknowledge(&self, id: &AlertId) -> AppResult<bool> {
        let at = Utc::now();
        let newly = self.log.acknowledge(id, at)?;
        if newly {
            info!(alert_id = %id, "Alert acknowledged");
            if let Err(e) = self.sink.record_acknowledgement(id, at) {
                warn!(alert_id = %id, error = %e, "Failed to persist acknowledgement");
                Metrics::persistence_failure("acknowledgement");
            }
        }
        Ok(newly)
    }

    /// Alerts from durable storage, including earlier runs.
    pub fn stored_alerts(&self, filter: &AlertFilter) -> AppResult<Vec<Alert>> {
        Ok(self.sink.list_alerts(filter)?)
    }

    /// Per-provider request counters.
    pub fn provider_usage(&self) -> Vec<ProviderUsage> {
        self.client.usage()
    }

    /// Prometheus exposition text.
    pub fn metrics_text(&self) -> AppResult<String> {
        Ok(Metrics::gather_text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use surveil_alert::AlertError;
    use surveil_core::{DetectionResult, MetricKind, Severity};
    use surveil_persistence::{MemorySink, PersistenceSink};

    fn alert() -> Alert {
        let sym = Symbol::new("XYZ");
        Alert {
            id: AlertId::new(),
            symbol: sym.clone(),
            rule_id: "vol".to_string(),
            metric: MetricKind::VolumeRatio,
            value: 10.0,
            threshold: 3.0,
            severity: Severity::High,
            message: String::new(),
            detection: DetectionResult::insufficient(sym, Utc::now(), dec!(1), dec!(1), 0, 0),
            created_at: Utc::now(),
            acknowledged: false,
            acknowledged_at: None,
        }
    }

    fn handle(sink: Arc<MemorySink>, log: Arc<AlertLog>) -> MonitorHandle {
        MonitorHandle::new(
            Arc::new(SymbolCache::default()),
            log,
            sink,
            Arc::new(SourceClient::new(Duration::from_secs(1))),
        )
    }

    #[test]
    fn test_acknowledge_updates_log_and_sink() {
        let sink = Arc::new(MemorySink::new());
        let log = Arc::new(AlertLog::new());
        let a = alert();
        log.append(a.clone());
        sink.append_alert(&a).unwrap();

        let monitor = handle(sink.clone(), log.clone());
        assert!(monitor.acknowledge(&a.id).unwrap());
        assert!(!monitor.acknowledge(&a.id).unwrap());

        assert!(monitor.alert(&a.id).unwrap().acknowledged);
        assert_eq!(monitor.alert_summary().unacknowledged, 0);
        let stored = monitor
            .stored_alerts(&AlertFilter::new().acknowledged(true))
            .unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_acknowledge_unknown_alert() {
        let monitor = handle(Arc::new(MemorySink::new()), Arc::new(AlertLog::new()));
        let err = monitor.acknowledge(&AlertId::new()).unwrap_err();
        assert!(matches!(err, AppError::Alert(AlertError::NotFound(_))));
    }

    #[test]
    fn test_export_alerts_json() {
        let log = Arc::new(AlertLog::new());
        let open = alert();
        let acked = alert();
        log.append(open.clone());
        log.append(acked.clone());
        let monitor = handle(Arc::new(MemorySink::new()), log);
        monitor.acknowledge(&acked.id).unwrap();

        let text = monitor.export_alerts(10).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert!(json["exported_at"].is_string());
        assert_eq!(json["recent"].as_array().unwrap().len(), 2);
        let open_ids: Vec<_> = json["unacknowledged"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["id"].clone())
            .collect();
        assert_eq!(open_ids, vec![serde_json::to_value(open.id).unwrap()]);
    }
}
