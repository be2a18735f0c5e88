//! Prometheus metrics for the surveillance pipeline.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. A registration failure
//! means duplicate metric names, which must crash at startup rather than
//! silently drop observations. These panics only occur during static
//! initialization, never at runtime.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram, register_int_gauge,
    CounterVec, Encoder, GaugeVec, Histogram, IntGauge, TextEncoder,
};

/// Provider fetch attempts by outcome.
/// Labels: provider, outcome (success/rate_limited/budget_exhausted/not_found/transient/malformed/timeout)
pub static FETCH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_fetch_total",
        "Provider fetch attempts by outcome",
        &["provider", "outcome"]
    )
    .unwrap()
});

/// Symbols for which every provider failed.
pub static SOURCE_UNAVAILABLE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_source_unavailable_total",
        "Fetches that exhausted every provider",
        &["symbol"]
    )
    .unwrap()
});

/// Remaining request budget per provider.
pub static PROVIDER_BUDGET_REMAINING: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "surveil_provider_budget_remaining",
        "Remaining requests in the provider's current window",
        &["provider"]
    )
    .unwrap()
});

/// Items waiting in the ingestion queue.
pub static QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("surveil_queue_depth", "Items waiting in the ingestion queue").unwrap()
});

/// Wall time of one polling tick in milliseconds.
pub static TICK_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "surveil_tick_duration_ms",
        "Polling tick duration in milliseconds",
        vec![5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

/// Snapshots dropped before reaching the cache.
/// Labels: reason (malformed/out_of_order)
pub static SNAPSHOTS_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_snapshots_rejected_total",
        "Snapshots rejected by the cache",
        &["symbol", "reason"]
    )
    .unwrap()
});

/// Detector evaluations.
/// Labels: status (ready/insufficient_history)
pub static DETECTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_detections_total",
        "Detector evaluations",
        &["symbol", "status"]
    )
    .unwrap()
});

/// Flags raised by the detector.
/// Labels: flag (price_spike/volume_spike/statistical_outlier)
pub static DETECTION_FLAGS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_detection_flags_total",
        "Anomaly flags raised by the detector",
        &["symbol", "flag"]
    )
    .unwrap()
});

/// Isolation-forest refits completed.
pub static MODEL_REFITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_model_refits_total",
        "Outlier model refits",
        &["symbol", "result"]
    )
    .unwrap()
});

/// Alerts created.
pub static ALERTS_FIRED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_alerts_fired_total",
        "Alerts fired",
        &["rule", "severity"]
    )
    .unwrap()
});

/// Rule crossings suppressed by cooldown.
pub static ALERTS_SUPPRESSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_alerts_suppressed_total",
        "Rule crossings suppressed by cooldown",
        &["rule"]
    )
    .unwrap()
});

/// Persistence sink write failures.
/// Labels: record (snapshot/alert/acknowledgement/retention)
pub static PERSISTENCE_FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_persistence_failures_total",
        "Persistence sink failures",
        &["record"]
    )
    .unwrap()
});

/// Buffered records discarded because their file could not be written.
pub static PERSISTENCE_DROPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_persistence_dropped_total",
        "Records dropped from a full persistence buffer",
        &["stream"]
    )
    .unwrap()
});

/// Notification deliveries by result.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "surveil_notifications_total",
        "Notification deliveries",
        &["channel", "result"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a provider fetch outcome.
    pub fn fetch_outcome(provider: &str, outcome: &str) {
        FETCH_TOTAL.with_label_values(&[provider, outcome]).inc();
    }

    /// Record a fetch that exhausted every provider.
    pub fn source_unavailable(symbol: &str) {
        SOURCE_UNAVAILABLE_TOTAL.with_label_values(&[symbol]).inc();
    }

    /// Set remaining budget for a provider.
    pub fn provider_budget(provider: &str, remaining: u32) {
        PROVIDER_BUDGET_REMAINING
            .with_label_values(&[provider])
            .set(f64::from(remaining));
    }

    pub fn queue_depth(depth: i64) {
        QUEUE_DEPTH.set(depth);
    }

    /// Record polling tick duration.
    pub fn tick_duration(duration_ms: f64) {
        TICK_DURATION_MS.observe(duration_ms);
    }

    /// Record a snapshot the cache refused.
    pub fn snapshot_rejected(symbol: &str, reason: &str) {
        SNAPSHOTS_REJECTED_TOTAL
            .with_label_values(&[symbol, reason])
            .inc();
    }

    /// Record a detector evaluation.
    pub fn detection(symbol: &str, status: &str) {
        DETECTIONS_TOTAL.with_label_values(&[symbol, status]).inc();
    }

    /// Record a raised detection flag.
    pub fn detection_flag(symbol: &str, flag: &str) {
        DETECTION_FLAGS_TOTAL.with_label_values(&[symbol, flag]).inc();
    }

    /// Record a model refit result (ok/failed).
    pub fn model_refit(symbol: &str, result: &str) {
        MODEL_REFITS_TOTAL.with_label_values(&[symbol, result]).inc();
    }

    pub fn alert_fired(rule: &str, severity: &str) {
        ALERTS_FIRED_TOTAL.with_label_values(&[rule, severity]).inc();
    }

    pub fn alert_suppressed(rule: &str) {
        ALERTS_SUPPRESSED_TOTAL.with_label_values(&[rule]).inc();
    }

    /// Record a persistence failure.
    pub fn persistence_failure(record: &str) {
        PERSISTENCE_FAILURES_TOTAL.with_label_values(&[record]).inc();
    }

    pub fn persistence_dropped(stream: &str, count: usize) {
        PERSISTENCE_DROPPED_TOTAL
            .with_label_values(&[stream])
            .inc_by(count as f64);
    }

    /// Record a notification delivery result (sent/failed).
    pub fn notification(channel: &str, result: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[channel, result]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_recorded_metrics() {
        Metrics::fetch_outcome("test-provider", "success");
        Metrics::alert_fired("test-rule", "high");
        Metrics::queue_depth(3);

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("surveil_fetch_total"));
        assert!(text.contains("test-provider"));
        assert!(text.contains("surveil_alerts_fired_total"));
        assert!(text.contains("surveil_queue_depth"));
    }

    #[test]
    fn test_counter_increments() {
        let before = FETCH_TOTAL
            .with_label_values(&["counter-provider", "timeout"])
            .get();
        Metrics::fetch_outcome("counter-provider", "timeout");
        Metrics::fetch_outcome("counter-provider", "timeout");
        let after = FETCH_TOTAL
            .with_label_values(&["counter-provider", "timeout"])
            .get();
        assert_eq!(after - before, 2.0);
    }
}
