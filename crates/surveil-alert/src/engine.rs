//! Alert engine implementation.
//!
//! Per (symbol, rule) state machine: Idle -> Triggered -> Cooling-down -> Idle.
//! A crossing fires only when the pair is not cooling down; a suppressed
//! crossing creates no alert and leaves the cooldown untouched. Time is the
//! detection's timestamp, so replays evaluate identically.

use crate::config::AlertConfig;
use crate::error::{AlertError, AlertResult};
use crate::log::AlertLog;
use crate::severity::SeverityBands;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use surveil_core::{Alert, AlertId, AlertRule, DetectionResult, MetricKind, Symbol};
use surveil_telemetry::Metrics;
use tracing::{debug, info};

type CooldownKey = (Symbol, String);

/// Stateful evaluator of alert rules.
pub struct AlertEngine {
    rules: Vec<AlertRule>,
    bands: SeverityBands,
    /// Last trigger time per (symbol, rule id).
    cooldowns: HashMap<CooldownKey, DateTime<Utc>>,
    /// Newest detection timestamp evaluated per symbol.
    last_seen: HashMap<Symbol, DateTime<Utc>>,
    log: Arc<AlertLog>,
}

fn chrono_cooldown(rule: &AlertRule) -> Duration {
    Duration::seconds(rule.cooldown_secs.min(i64::MAX as u64 / 1_000) as i64)
}

fn format_message(symbol: &Symbol, metric: MetricKind, value: f64, threshold: f64) -> String {
    match metric {
        MetricKind::PriceChangePct => {
            format!("{symbol} price change {value:+.2}% (threshold {threshold:.2}%)")
        }
        MetricKind::VolumeRatio => {
            format!("{symbol} volume ratio {value:.2}x (threshold {threshold:.2}x)")
        }
        MetricKind::OutlierScore => {
            format!("{symbol} outlier score {value:.3} (threshold {threshold:.3})")
        }
        MetricKind::PriceZscore => {
            format!("{symbol} price z-score {value:+.2} (threshold {threshold:.2})")
        }
        MetricKind::VolumeZscore => {
            format!("{symbol} volume z-score {value:+.2} (threshold {threshold:.2})")
        }
    }
}

impl AlertEngine {
    /// Create an engine with its own audit log.
    pub fn new(config: AlertConfig) -> AlertResult<Self> {
        Self::with_log(config, Arc::new(AlertLog::new()))
    }

    /// Create an engine appending to a shared audit log.
    pub fn with_log(config: AlertConfig, log: Arc<AlertLog>) -> AlertResult<Self> {
        config.validate().map_err(AlertError::InvalidConfig)?;
        Ok(Self {
            rules: config.rules,
            bands: config.severity_bands,
            cooldowns: HashMap::new(),
            last_seen: HashMap::new(),
            log,
        })
    }

    pub fn rules(&self) -> &[AlertRule] {
        &self.rules
    }

    pub fn log(&self) -> &Arc<AlertLog> {
        &self.log
    }

    /// Evaluate every applicable rule against a detection.
    ///
    /// Returns the alerts fired, already appended to the log. Detections
    /// without full history are ignored.
    pub fn evaluate(&mut self, result: &DetectionResult) -> Vec<Alert> {
        if !result.is_ready() {
            return Vec::new();
        }

        let now = result.timestamp;
        self.last_seen
            .entry(result.symbol.clone())
            .and_modify(|seen| *seen = (*seen).max(now))
            .or_insert(now);
        let mut fired = Vec::new();

        for rule in self.rules.iter().filter(|r| r.applies_to(&result.symbol)) {
            let Some(value) = rule.metric.value(result) else {
                continue;
            };
            if !value.is_finite() || !rule.direction.crosses(value, rule.threshold) {
                continue;
            }

            let key = (result.symbol.clone(), rule.id.clone());
            if let Some(last) = self.cooldowns.get(&key) {
                if now - *last < chrono_cooldown(rule) {
                    debug!(
                        symbol = %result.symbol,
                        rule = %rule.id,
                        value,
                        last_trigger = %last,
                        "Alert suppressed: cooldown active"
                    );
                    Metrics::alert_suppressed(&rule.id);
                    continue;
                }
            }

            let severity = self.bands.for_breach(value, rule.threshold);
            let alert = Alert {
                id: AlertId::new(),
                symbol: result.symbol.clone(),
                rule_id: rule.id.clone(),
                metric: rule.metric,
                value,
                threshold: rule.threshold,
                severity,
                message: format_message(&result.symbol, rule.metric, value, rule.threshold),
                detection: result.clone(),
                created_at: now,
                acknowledged: false,
                acknowledged_at: None,
            };

            self.cooldowns.insert(key, now);
            info!(
                alert_id = %alert.id,
                symbol = %alert.symbol,
                rule = %rule.id,
                severity = %severity,
                value,
                threshold = rule.threshold,
                "Alert fired"
            );
            Metrics::alert_fired(&rule.id, severity.as_str());
            self.log.append(alert.clone());
            fired.push(alert);
        }

        fired
    }

    /// Time left before `rule_id` may fire again for `symbol`, as of `now`.
    pub fn cooldown_remaining(
        &self,
        symbol: &Symbol,
        rule_id: &str,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let rule = self.rules.iter().find(|r| r.id == rule_id)?;
        let last = self.cooldowns.get(&(symbol.clone(), rule_id.to_string()))?;
        let remaining = chrono_cooldown(rule) - (now - *last);
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// Drop cooldown entries that have expired on their symbol's detection
    /// clock, the newest timestamp evaluated for it.
    ///
    /// The cache only admits non-decreasing timestamps per symbol, so an
    /// entry expired on that clock can never suppress a later crossing.
    /// Returns the number removed.
    pub fn prune_cooldowns(&mut self) -> usize {
        let cooldowns: HashMap<&str, Duration> = self
            .rules
            .iter()
            .map(|r| (r.id.as_str(), chrono_cooldown(r)))
            .collect();
        let last_seen = &self.last_seen;
        let before = self.cooldowns.len();
        self.cooldowns.retain(|(symbol, rule_id), last| {
            let Some(cooldown) = cooldowns.get(rule_id.as_str()) else {
                return false;
            };
            last_seen
                .get(symbol)
                .map_or(true, |seen| *seen - *last < *cooldown)
        });
        before - self.cooldowns.len()
    }

    pub fn cooldown_count(&self) -> usize {
        self.cooldowns.len()
    }
}
