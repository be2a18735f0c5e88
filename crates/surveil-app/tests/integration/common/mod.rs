//! Shared fixtures for integration tests.

pub mod stub_provider;
