//! Alert queries and retention windows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use surveil_core::{Alert, Severity, Symbol};

/// Criteria for `list_alerts`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub symbol: Option<Symbol>,
    /// Include alerts at or above this severity.
    pub min_severity: Option<Severity>,
    /// Include alerts created at or after this time.
    pub since: Option<DateTime<Utc>>,
    pub acknowledged: Option<bool>,
    /// Maximum results, newest first.
    pub limit: Option<usize>,
}

impl AlertFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn min_severity(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn acknowledged(mut self, acknowledged: bool) -> Self {
        self.acknowledged = Some(acknowledged);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        self.symbol.as_ref().map_or(true, |s| &alert.symbol == s)
            && self.min_severity.map_or(true, |m| alert.severity >= m)
            && self.since.map_or(true, |t| alert.created_at >= t)
            && self.acknowledged.map_or(true, |a| alert.acknowledged == a)
    }

    /// Filter, order newest first, and truncate to the limit.
    pub fn apply(&self, alerts: impl IntoIterator<Item = Alert>) -> Vec<Alert> {
        let mut selected: Vec<Alert> = alerts.into_iter().filter(|a| self.matches(a)).collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// How long stored records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    #[serde(default = "default_snapshot_max_age_days")]
    pub snapshot_max_age_days: u32,
    #[serde(default = "default_alert_max_age_days")]
    pub alert_max_age_days: u32,
}

fn default_snapshot_max_age_days() -> u32 {
    30
}

fn default_alert_max_age_days() -> u32 {
    90
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            snapshot_max_age_days: default_snapshot_max_age_days(),
            alert_max_age_days: default_alert_max_age_days(),
        }
    }
}

impl RetentionPolicy {
    /// Snapshots older than this are removable.
    pub fn snapshot_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.snapshot_max_age_days))
    }

    /// Alerts (and their acknowledgements) older than this are removable.
    pub fn alert_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.alert_max_age_days))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.snapshot_max_age_days == 0 || self.alert_max_age_days == 0 {
            return Err(format!(
                "retention days must be positive (snapshots {}, alerts {})",
                self.snapshot_max_age_days, self.alert_max_age_days
            ));
        }
        Ok(())
    }
}
