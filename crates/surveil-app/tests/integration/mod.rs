//! Integration tests for surveil-app.
//!
//! These tests drive the full application with stub providers:
//! - Provider fallback feeding the pipeline
//! - Spike detection through to alerting
//! - Shutdown draining

pub mod common;
