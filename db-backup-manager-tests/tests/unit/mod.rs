//! Unit tests for db-backup-manager
//!
//! These tests cover configuration loading and target sources through the
//! public API.

mod config;
mod targets;
