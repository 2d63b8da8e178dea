//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.
//! Every path points into a private temporary directory.

use db_backup_manager::config::{Config, TargetSourceKind};
use db_backup_manager::model::EventStatus;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with minimal defaults
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        let mut config = Config::default();
        config.global.work_dir = temp_dir.path().join("work");
        config.global.log_directory = log_directory;
        config.global.log_max_files = 5;
        config.targets.file = temp_dir.path().join("db.json");

        Self { temp_dir, config }
    }

    /// Config with storage credentials and a two-database target file
    pub fn minimal() -> Self {
        Self::new()
            .with_storage_credentials("backup@example.com", "mega-secret")
            .with_target_names(&["sales", "crm"])
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn targets_file(&self) -> &Path {
        &self.config.targets.file
    }

    pub fn with_storage_credentials(mut self, email: &str, password: &str) -> Self {
        self.config.storage.email = email.to_string();
        self.config.storage.password = password.to_string();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.global.concurrency = concurrency;
        self
    }

    pub fn with_exclude_patterns(mut self, patterns: &[&str]) -> Self {
        self.config.global.exclude_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_database_host(mut self, host: &str, port: u16) -> Self {
        self.config.database.host = host.to_string();
        self.config.database.port = port;
        self
    }

    pub fn with_webhook(mut self, url: &str, notify_on: Vec<EventStatus>) -> Self {
        self.config.notifications.webhook_url = url.to_string();
        self.config.notifications.notify_on = notify_on;
        self
    }

    pub fn with_catalog_source(mut self) -> Self {
        self.config.targets.source = TargetSourceKind::Catalog;
        self
    }

    /// Write a `db.json` listing bare database names
    pub fn with_target_names(self, names: &[&str]) -> Self {
        let json = serde_json::to_string_pretty(names).expect("Failed to serialize names");
        self.with_targets_json(&json)
    }

    /// Write raw `db.json` contents
    pub fn with_targets_json(self, json: &str) -> Self {
        fs::write(&self.config.targets.file, json).expect("Failed to write db.json");
        self
    }

    /// Build the configuration (the temp dir is dropped, so paths become dangling)
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and return the temp dir alongside the config, keeping the files alive
    pub fn persist(self) -> (Config, TempDir) {
        (self.config, self.temp_dir)
    }

    /// Write the configuration as TOML and return its path with the config
    pub fn persist_to_file(self) -> (PathBuf, Config, TempDir) {
        let path = self.temp_dir.path().join("config.toml");
        let toml_str = toml::to_string_pretty(&self.config).expect("Failed to serialize config");
        fs::write(&path, toml_str).expect("Failed to write config file");
        (path, self.config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
