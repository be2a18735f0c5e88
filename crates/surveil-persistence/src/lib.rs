//! Durable storage for the surveillance pipeline.
//!
//! Appends snapshots, alerts and acknowledgements to daily JSON Lines files
//! and serves filtered alert queries. An in-memory sink backs tests and
//! runs without a data directory.

pub mod config;
pub mod error;
pub mod filter;
pub mod jsonl;
pub mod memory;
pub mod sink;
pub mod writer;

pub use config::{PersistenceConfig, SinkBackend};
pub use error::{PersistenceError, PersistenceResult};
pub use filter::{AlertFilter, RetentionPolicy};
pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;
pub use sink::{DynPersistenceSink, PersistenceSink, RetentionReport};
pub use writer::JsonLinesWriter;
