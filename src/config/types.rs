use crate::model::EventStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub targets: TargetSourceConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Directory holding dump and archive files while a run is in progress
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Number of targets processed in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Targets whose id contains any of these (case-insensitive) are skipped
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            concurrency: default_concurrency(),
            exclude_patterns: default_exclude_patterns(),
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

/// Database server and dump command settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,

    /// Database used for catalog queries
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,

    /// Dump program (looked up on PATH)
    #[serde(default = "default_dump_command")]
    pub dump_command: String,
    #[serde(default)]
    pub dump_format: DumpFormat,
    #[serde(default = "default_dump_timeout")]
    pub dump_timeout_seconds: u64,

    /// Catalog query program (looked up on PATH)
    #[serde(default = "default_psql_command")]
    pub psql_command: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            maintenance_db: default_maintenance_db(),
            dump_command: default_dump_command(),
            dump_format: DumpFormat::default(),
            dump_timeout_seconds: default_dump_timeout(),
            psql_command: default_psql_command(),
        }
    }
}

impl DatabaseConfig {
    pub fn dump_timeout(&self) -> Duration {
        Duration::from_secs(self.dump_timeout_seconds)
    }
}

/// pg_dump output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DumpFormat {
    #[default]
    Custom,
    Plain,
    Tar,
}

impl DumpFormat {
    /// Value passed to `pg_dump --format=`
    pub fn as_arg(&self) -> &'static str {
        match self {
            DumpFormat::Custom => "custom",
            DumpFormat::Plain => "plain",
            DumpFormat::Tar => "tar",
        }
    }
}

/// Compression settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompressionConfig {
    /// gzip level, 0 (none) to 9 (best)
    #[serde(default = "default_compression_level")]
    pub level: u32,
    #[serde(default = "default_buffer_size_kb")]
    pub buffer_size_kb: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: default_compression_level(),
            buffer_size_kb: default_buffer_size_kb(),
        }
    }
}

/// Remote storage (MEGA) settings
#[derive(Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_remote_folder")]
    pub remote_folder: String,
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            password: String::new(),
            remote_folder: default_remote_folder(),
            upload_timeout_seconds: default_upload_timeout(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("email", &self.email)
            .field("password", &"***")
            .field("remote_folder", &self.remote_folder)
            .field("upload_timeout_seconds", &self.upload_timeout_seconds)
            .finish()
    }
}

impl StorageConfig {
    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_seconds)
    }

    pub fn has_credentials(&self) -> bool {
        !self.email.trim().is_empty() && !self.password.is_empty()
    }
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: String,

    /// Name shown in notification titles
    #[serde(default = "default_project_name")]
    pub project_name: String,

    #[serde(default = "default_notify_on")]
    pub notify_on: Vec<EventStatus>,

    #[serde(default = "default_webhook_timeout")]
    pub timeout_seconds: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            project_name: default_project_name(),
            notify_on: default_notify_on(),
            timeout_seconds: default_webhook_timeout(),
        }
    }
}

/// Where the list of databases comes from
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetSourceKind {
    /// Static JSON file
    #[default]
    File,
    /// Live query against the server catalog
    Catalog,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetSourceConfig {
    #[serde(default)]
    pub source: TargetSourceKind,
    #[serde(default = "default_targets_file")]
    pub file: PathBuf,
}

impl Default for TargetSourceConfig {
    fn default() -> Self {
        Self {
            source: TargetSourceKind::default(),
            file: default_targets_file(),
        }
    }
}

// Default value functions

fn default_work_dir() -> PathBuf { std::env::temp_dir().join("db-backup-manager") }
fn default_concurrency() -> usize { 1 }
fn default_exclude_patterns() -> Vec<String> { vec!["test".to_string()] }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
fn default_db_host() -> String { "localhost".to_string() }
fn default_db_port() -> u16 { 5432 }
fn default_db_user() -> String { "postgres".to_string() }
fn default_maintenance_db() -> String { "postgres".to_string() }
fn default_dump_command() -> String { "pg_dump".to_string() }
fn default_psql_command() -> String { "psql".to_string() }
fn default_dump_timeout() -> u64 { 3600 }
fn default_compression_level() -> u32 { 6 }
fn default_buffer_size_kb() -> usize { 64 }
fn default_remote_folder() -> String { "/Backups".to_string() }
fn default_upload_timeout() -> u64 { 1800 }
fn default_project_name() -> String { "Database Backups".to_string() }
fn default_notify_on() -> Vec<EventStatus> {
    vec![EventStatus::Success, EventStatus::Failure]
}
fn default_webhook_timeout() -> u64 { 30 }
fn default_targets_file() -> PathBuf { PathBuf::from("db.json") }
