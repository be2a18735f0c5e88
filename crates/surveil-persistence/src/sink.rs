//! Persistence sink abstraction.

use crate::error::PersistenceResult;
use crate::filter::{AlertFilter, RetentionPolicy};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use surveil_core::{Alert, AlertId, Snapshot};

/// What a retention pass removed.
///
/// Counts are records for the in-memory sink and day files for the
/// JSON Lines sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub snapshots: usize,
    pub alerts: usize,
}

/// Durable store for snapshots and alerts.
///
/// Failures are reported to the caller, which logs them and continues; the
/// in-memory alert log stays authoritative for the running process.
pub trait PersistenceSink: Send + Sync {
    fn append_snapshot(&self, snapshot: &Snapshot) -> PersistenceResult<()>;

    fn append_alert(&self, alert: &Alert) -> PersistenceResult<()>;

    /// Record that a stored alert was acknowledged.
    fn record_acknowledgement(&self, id: &AlertId, at: DateTime<Utc>) -> PersistenceResult<()>;

    /// Stored alerts matching `filter`, newest first, with acknowledgements applied.
    fn list_alerts(&self, filter: &AlertFilter) -> PersistenceResult<Vec<Alert>>;

    /// Remove records older than the policy allows, as of `now`.
    fn apply_retention(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> PersistenceResult<RetentionReport>;

    /// Push buffered records to durable storage.
    fn flush(&self) -> PersistenceResult<()>;
}

/// Arc wrapper for PersistenceSink trait objects.
pub type DynPersistenceSink = Arc<dyn PersistenceSink>;
