//! JSON Lines persistence sink.
//!
//! Three daily-rotated streams share one directory:
//! - `snapshots_{date}.jsonl`: buffered, flushed every `buffer_size` records
//! - `alerts_{date}.jsonl`: written through on every append
//! - `acks_{date}.jsonl`: acknowledgement events, applied on read

use crate::error::PersistenceResult;
use crate::filter::{AlertFilter, RetentionPolicy};
use crate::sink::{PersistenceSink, RetentionReport};
use crate::writer::JsonLinesWriter;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use surveil_core::{Alert, AlertId, Snapshot};
use tracing::{debug, info, warn};

const SNAPSHOT_PREFIX: &str = "snapshots";
const ALERT_PREFIX: &str = "alerts";
const ACK_PREFIX: &str = "acks";

/// Acknowledgement event as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AckRecord {
    alert_id: AlertId,
    acknowledged_at: DateTime<Utc>,
}

struct Writers {
    snapshots: JsonLinesWriter,
    alerts: JsonLinesWriter,
    acks: JsonLinesWriter,
}

/// File-backed sink writing daily JSON Lines files.
pub struct JsonLinesSink {
    dir: PathBuf,
    writers: Mutex<Writers>,
}

impl JsonLinesSink {
    /// Open (or create) a sink rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>, snapshot_buffer: usize) -> PersistenceResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let writers = Writers {
            snapshots: JsonLinesWriter::new(&dir, SNAPSHOT_PREFIX, snapshot_buffer)?,
            alerts: JsonLinesWriter::new(&dir, ALERT_PREFIX, 1)?,
            acks: JsonLinesWriter::new(&dir, ACK_PREFIX, 1)?,
        };
        info!(dir = %dir.display(), "JSON Lines sink ready");
        Ok(Self {
            dir,
            writers: Mutex::new(writers),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files in the sink directory carrying `prefix`, with their dates, oldest first.
    fn dated_files(&self, prefix: &str) -> PersistenceResult<Vec<(NaiveDate, PathBuf)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(date) = JsonLinesWriter::file_date(prefix, name) {
                files.push((date, entry.path()));
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse every line of every `prefix` file, skipping lines that fail to decode.
    fn read_records<T: DeserializeOwned>(&self, prefix: &str) -> PersistenceResult<Vec<T>> {
        let mut records = Vec::new();
        for (_, path) in self.dated_files(prefix)? {
            let reader = BufReader::new(File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str(&line) {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(
                        file = %path.display(),
                        line = line_no + 1,
                        error = %e,
                        "Skipping unreadable record"
                    ),
                }
            }
        }
        Ok(records)
    }

    /// Delete `prefix` files dated before `cutoff`'s day.
    fn remove_before(&self, prefix: &str, cutoff: DateTime<Utc>) -> PersistenceResult<usize> {
        let cutoff_date = cutoff.date_naive();
        let mut removed = 0;
        for (date, path) in self.dated_files(prefix)? {
            if date < cutoff_date {
                std::fs::remove_file(&path)?;
                debug!(file = %path.display(), "Removed expired file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl PersistenceSink for JsonLinesSink {
    fn append_snapshot(&self, snapshot: &Snapshot) -> PersistenceResult<()> {
        self.writers.lock().snapshots.add_record(snapshot)
    }

    fn append_alert(&self, alert: &Alert) -> PersistenceResult<()> {
        self.writers.lock().alerts.add_record(alert)
    }

    fn record_acknowledgement(&self, id: &AlertId, at: DateTime<Utc>) -> PersistenceResult<()> {
        let record = AckRecord {
            alert_id: *id,
            acknowledged_at: at,
        };
        self.writers.lock().acks.add_record(&record)
    }

    fn list_alerts(&self, filter: &AlertFilter) -> PersistenceResult<Vec<Alert>> {
        // Hold the writers so no append interleaves with the read.
        let mut writers = self.writers.lock();
        writers.alerts.flush()?;
        writers.acks.flush()?;

        let mut alerts: Vec<Alert> = self.read_records(ALERT_PREFIX)?;
        let acks: Vec<AckRecord> = self.read_records(ACK_PREFIX)?;
        drop(writers);

        // First acknowledgement wins.
        let mut acked_at: HashMap<AlertId, DateTime<Utc>> = HashMap::new();
        for ack in acks {
            acked_at.entry(ack.alert_id).or_insert(ack.acknowledged_at);
        }
        for alert in &mut alerts {
            if let Some(at) = acked_at.get(&alert.id) {
                alert.acknowledge(*at);
            }
        }

        Ok(filter.apply(alerts))
    }

    fn apply_retention(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> PersistenceResult<RetentionReport> {
        let _writers = self.writers.lock();
        let report = RetentionReport {
            snapshots: self.remove_before(SNAPSHOT_PREFIX, policy.snapshot_cutoff(now))?,
            alerts: self.remove_before(ALERT_PREFIX, policy.alert_cutoff(now))?,
        };
        self.remove_before(ACK_PREFIX, policy.alert_cutoff(now))?;

        if report != RetentionReport::default() {
            info!(
                snapshot_files = report.snapshots,
                alert_files = report.alerts,
                "Retention pass removed files"
            );
        }
        Ok(report)
    }

    fn flush(&self) -> PersistenceResult<()> {
        let mut writers = self.writers.lock();
        writers.snapshots.flush()?;
        writers.alerts.flush()?;
        writers.acks.flush()
    }
}
