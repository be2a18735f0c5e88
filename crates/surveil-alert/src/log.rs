//! In-memory alert audit log.
//!
//! Append-only; the only mutation of a stored alert is acknowledgement.
//! Shared between the pipeline (writer) and presentation readers.

use crate::error::{AlertError, AlertResult};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use surveil_core::{Alert, AlertId, Severity, Symbol};

#[derive(Debug, Default)]
struct LogInner {
    alerts: Vec<Alert>,
    index: HashMap<AlertId, usize>,
}

/// Counts over the whole log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub total: usize,
    pub unacknowledged: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_symbol: BTreeMap<Symbol, usize>,
}

/// Point-in-time export of the log for offline review.
#[derive(Debug, Clone, Serialize)]
pub struct AlertExport {
    pub exported_at: DateTime<Utc>,
    /// Every unacknowledged alert, newest first.
    pub unacknowledged: Vec<Alert>,
    /// The newest alerts regardless of state, newest first.
    pub recent: Vec<Alert>,
}

/// Authoritative record of every alert raised during a run.
#[derive(Debug, Default)]
pub struct AlertLog {
    inner: RwLock<LogInner>,
}

impl AlertLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, alert: Alert) {
        let mut inner = self.inner.write();
        let pos = inner.alerts.len();
        inner.index.insert(alert.id, pos);
        inner.alerts.push(alert);
    }

    /// Up to `limit` alerts, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Alert> {
        self.inner
            .read()
            .alerts
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &AlertId) -> Option<Alert> {
        let inner = self.inner.read();
        inner.index.get(id).map(|&pos| inner.alerts[pos].clone())
    }

    /// Acknowledge an alert.
    ///
    /// Returns true if newly acknowledged, false if it already was.
    pub fn acknowledge(&self, id: &AlertId, at: DateTime<Utc>) -> AlertResult<bool> {
        let mut inner = self.inner.write();
        let pos = *inner.index.get(id).ok_or(AlertError::NotFound(*id))?;
        Ok(inner.alerts[pos].acknowledge(at))
    }

    pub fn summary(&self) -> AlertSummary {
        let inner = self.inner.read();
        let mut summary = AlertSummary {
            total: inner.alerts.len(),
            ..Default::default()
        };
        for alert in &inner.alerts {
            if !alert.acknowledged {
                summary.unacknowledged += 1;
            }
            *summary.by_severity.entry(alert.severity).or_default() += 1;
            *summary.by_symbol.entry(alert.symbol.clone()).or_default() += 1;
        }
        summary
    }

    /// Snapshot of open alerts plus the newest `limit` alerts.
    pub fn export(&self, limit: usize, now: DateTime<Utc>) -> AlertExport {
        let inner = self.inner.read();
        AlertExport {
            exported_at: now,
            unacknowledged: inner
                .alerts
                .iter()
                .rev()
                .filter(|a| !a.acknowledged)
                .cloned()
                .collect(),
            recent: inner.alerts.iter().rev().take(limit).cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().alerts.is_empty()
    }
}
