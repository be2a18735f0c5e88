//! Alert rules and alert records.

use crate::detection::DetectionResult;
use crate::error::{CoreError, Result};
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Ordered alert severity.
///
/// Ordering is total: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric a rule is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Tick-over-tick price change in percent.
    PriceChangePct,
    /// Current volume over trailing mean volume.
    VolumeRatio,
    /// Isolation-forest anomaly score.
    OutlierScore,
    /// Price return z-score.
    PriceZscore,
    /// Volume z-score.
    VolumeZscore,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceChangePct => "price_change_pct",
            Self::VolumeRatio => "volume_ratio",
            Self::OutlierScore => "outlier_score",
            Self::PriceZscore => "price_zscore",
            Self::VolumeZscore => "volume_zscore",
        }
    }

    /// Read this metric from a detection result.
    ///
    /// Returns `None` when the metric is unavailable (no fitted model yet).
    pub fn value(&self, result: &DetectionResult) -> Option<f64> {
        match self {
            Self::PriceChangePct => Some(result.price_change_pct),
            Self::VolumeRatio => Some(result.volume_ratio),
            Self::OutlierScore => result.outlier_score,
            Self::PriceZscore => Some(result.price_zscore),
            Self::VolumeZscore => Some(result.volume_zscore),
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crossing direction for a rule threshold `T` (always positive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Fires when `value >= T`.
    #[default]
    Above,
    /// Fires when `value <= -T`.
    Below,
    /// Fires when `|value| >= T`.
    Either,
}

impl Direction {
    pub fn crosses(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::Above => value >= threshold,
            Self::Below => value <= -threshold,
            Self::Either => value.abs() >= threshold,
        }
    }
}

/// Symbols a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleScope {
    /// Every watched symbol (`"*"` in configuration).
    Any,
    Symbol(Symbol),
}

impl RuleScope {
    pub fn matches(&self, symbol: &Symbol) -> bool {
        match self {
            Self::Any => true,
            Self::Symbol(s) => s == symbol,
        }
    }
}

impl From<String> for RuleScope {
    fn from(raw: String) -> Self {
        if raw.trim() == "*" {
            Self::Any
        } else {
            Self::Symbol(Symbol::new(raw))
        }
    }
}

impl From<RuleScope> for String {
    fn from(scope: RuleScope) -> Self {
        match scope {
            RuleScope::Any => "*".to_string(),
            RuleScope::Symbol(s) => s.to_string(),
        }
    }
}

fn default_cooldown_secs() -> u64 {
    300 // 5 minutes
}

/// User-configured alert rule.
///
/// Read-only to the alert engine at evaluation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Stable rule identifier, unique within the rule set.
    pub id: String,
    /// Symbol or wildcard.
    #[serde(rename = "symbol")]
    pub scope: RuleScope,
    pub metric: MetricKind,
    /// Positive threshold magnitude.
    pub threshold: f64,
    #[serde(default)]
    pub direction: Direction,
    /// Minimum seconds between firings for the same (symbol, rule).
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl AlertRule {
    pub fn new(
        id: impl Into<String>,
        scope: RuleScope,
        metric: MetricKind,
        threshold: f64,
        direction: Direction,
        cooldown: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            scope,
            metric,
            threshold,
            direction,
            cooldown_secs: cooldown.as_secs(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn applies_to(&self, symbol: &Symbol) -> bool {
        self.scope.matches(symbol)
    }

    /// Reject rules that can never fire sensibly.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CoreError::InvalidRule("rule id must not be empty".to_string()));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(CoreError::InvalidRule(format!(
                "{}: threshold ({}) must be a positive finite number",
                self.id, self.threshold
            )));
        }
        Ok(())
    }
}

/// Unique alert identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertId(pub Uuid);

impl AlertId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlertId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlertId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An alert raised by the alert engine.
///
/// Immutable after creation except for acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub symbol: Symbol,
    pub rule_id: String,
    pub metric: MetricKind,
    /// Metric value that crossed the threshold.
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    /// Detection that triggered the alert.
    pub detection: DetectionResult,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Mark as acknowledged. Returns false if it already was.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.acknowledged {
            return false;
        }
        self.acknowledged = true;
        self.acknowledged_at = Some(at);
        true
    }
}
