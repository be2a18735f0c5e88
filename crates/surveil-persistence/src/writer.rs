//! Daily-rotated JSON Lines file writer.
//!
//! Each line is a complete JSON object, so an interrupted write damages at
//! most the last line. Files are `{prefix}_{YYYY-MM-DD}.jsonl`, opened in
//! append mode so restarts never truncate earlier data.
//!
//! While the file cannot be written, records stay buffered up to a cap;
//! past it the oldest are dropped and counted.

use crate::error::{PersistenceError, PersistenceResult};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use surveil_telemetry::Metrics;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Pending cap, as a multiple of the flush size.
const PENDING_FACTOR: usize = 10;
const MIN_PENDING: usize = 100;

/// Active writer state for daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Buffered JSON Lines writer for one record stream.
pub struct JsonLinesWriter {
    /// Base directory for output files.
    base_dir: PathBuf,
    /// File name prefix (e.g. "alerts").
    prefix: String,
    /// Serialized records awaiting flush.
    buffer: Vec<String>,
    /// Maximum buffer size before flush.
    max_buffer_size: usize,
    /// Records kept while flushes fail.
    max_pending: usize,
    /// Records discarded from a full buffer.
    dropped: u64,
    /// Active writer (open until date rotation).
    active_writer: Option<ActiveWriter>,
}

impl JsonLinesWriter {
    /// Create a new writer. The directory is created if missing.
    pub fn new(
        base_dir: impl AsRef<Path>,
        prefix: impl Into<String>,
        max_buffer_size: usize,
    ) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        let max_buffer_size = max_buffer_size.max(1);

        Ok(Self {
            base_dir,
            prefix: prefix.into(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            max_pending: max_buffer_size.saturating_mul(PENDING_FACTOR).max(MIN_PENDING),
            dropped: 0,
            active_writer: None,
        })
    }

    /// Override the number of records kept while flushes fail.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(self.max_buffer_size);
        self
    }

    pub fn file_path(&self, date: &str) -> PathBuf {
        self.base_dir.join(format!("{}_{date}.jsonl", self.prefix))
    }

    /// Date encoded in a file name produced by a writer with `prefix`.
    pub fn file_date(prefix: &str, file_name: &str) -> Option<NaiveDate> {
        let date = file_name
            .strip_prefix(prefix)?
            .strip_prefix('_')?
            .strip_suffix(".jsonl")?;
        NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
    }

    /// Buffer a record, flushing when the buffer is full.
    ///
    /// A failed flush keeps the unwritten records for the next attempt.
    pub fn add_record<T: Serialize>(&mut self, record: &T) -> PersistenceResult<()> {
        self.buffer.push(serde_json::to_string(record)?);
        self.enforce_pending_cap();

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Records dropped since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn enforce_pending_cap(&mut self) {
        let overflow = self.buffer.len().saturating_sub(self.max_pending);
        if overflow == 0 {
            return;
        }
        self.buffer.drain(..overflow);
        self.dropped += overflow as u64;
        Metrics::persistence_dropped(&self.prefix, overflow);
        warn!(
            prefix = %self.prefix,
            dropped = overflow,
            total_dropped = self.dropped,
            "Persistence buffer full, dropped oldest records"
        );
    }

    /// Close the active writer.
    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, prefix = %self.prefix, "Failed to flush writer on close");
            }
            info!(
                prefix = %self.prefix,
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }

    fn open_writer(&self, date: &str) -> PersistenceResult<ActiveWriter> {
        let filename = self.file_path(date);
        info!(filename = %filename.display(), "Opening JSON Lines writer (append mode)");

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        })
    }

    /// Flush buffer to today's file.
    pub fn flush(&mut self) -> PersistenceResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format(DATE_FORMAT).to_string();

        if self
            .active_writer
            .as_ref()
            .is_some_and(|w| w.date != today)
        {
            self.close_active_writer();
        }
        if self.active_writer.is_none() {
            self.active_writer = Some(self.open_writer(&today)?);
        }
        let Some(active) = self.active_writer.as_mut() else {
            return Err(PersistenceError::WriteFailure(format!(
                "no writer for {}",
                self.prefix
            )));
        };

        // Lines accepted by the BufWriter stay there across a failed flush,
        // so they leave our buffer and are never written twice.
        let mut written = 0;
        let mut outcome = Ok(());
        for line in &self.buffer {
            if let Err(e) = writeln!(active.writer, "{line}") {
                outcome = Err(e);
                break;
            }
            written += 1;
        }
        if outcome.is_ok() {
            outcome = active.writer.flush();
        }
        active.records_written += written;
        self.buffer.drain(..written);
        outcome?;

        debug!(
            prefix = %self.prefix,
            date = %today,
            records = written,
            "Flushed records to JSON Lines"
        );
        Ok(())
    }

    /// Close the writer, flushing any pending data.
    pub fn close(&mut self) -> PersistenceResult<()> {
        self.flush()?;
        self.close_active_writer();
        Ok(())
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, prefix = %self.prefix, "Failed to flush buffer on drop");
        }
        self.close_active_writer();
    }
}
