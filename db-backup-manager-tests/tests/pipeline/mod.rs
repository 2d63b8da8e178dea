//! Pipeline tests for db-backup-manager
//!
//! These tests drive the orchestrator end to end with mocked dump/upload stages
//! and the real gzip compressor.

mod cancellation;
mod concurrency;
mod properties;
mod scenarios;
