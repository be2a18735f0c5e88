//! Process-local persistence sink.

use crate::error::PersistenceResult;
use crate::filter::{AlertFilter, RetentionPolicy};
use crate::sink::{PersistenceSink, RetentionReport};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use surveil_core::{Alert, AlertId, Snapshot};

#[derive(Debug, Default)]
struct MemoryInner {
    snapshots: Vec<Snapshot>,
    alerts: Vec<Alert>,
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    inner: RwLock<MemoryInner>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.read().snapshots.len()
    }

    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.inner.read().snapshots.clone()
    }

    pub fn alert_count(&self) -> usize {
        self.inner.read().alerts.len()
    }
}

impl PersistenceSink for MemorySink {
    fn append_snapshot(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        self.inner.write().snapshots.push(snapshot.clone());
        Ok(())
    }

    fn append_alert(&self, alert: &Alert) -> PersistenceResult<()> {
        self.inner.write().alerts.push(alert.clone());
        Ok(())
    }

    fn record_acknowledgement(&self, id: &AlertId, at: DateTime<Utc>) -> PersistenceResult<()> {
        let mut inner = self.inner.write();
        if let Some(alert) = inner.alerts.iter_mut().find(|a| &a.id == id) {
            alert.acknowledge(at);
        }
        Ok(())
    }

    fn list_alerts(&self, filter: &AlertFilter) -> PersistenceResult<Vec<Alert>> {
        let inner = self.inner.read();
        Ok(filter.apply(inner.alerts.iter().cloned()))
    }

    fn apply_retention(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> PersistenceResult<RetentionReport> {
        let snapshot_cutoff = policy.snapshot_cutoff(now);
        let alert_cutoff = policy.alert_cutoff(now);

        let mut inner = self.inner.write();
        let (snapshots_before, alerts_before) = (inner.snapshots.len(), inner.alerts.len());
        inner.snapshots.retain(|s| s.timestamp >= snapshot_cutoff);
        inner.alerts.retain(|a| a.created_at >= alert_cutoff);

        Ok(RetentionReport {
            snapshots: snapshots_before - inner.snapshots.len(),
            alerts: alerts_before - inner.alerts.len(),
        })
    }

    fn flush(&self) -> PersistenceResult<()> {
        Ok(())
    }
}
