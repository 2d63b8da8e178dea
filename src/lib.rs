//! Database Backup Manager Library
//!
//! Backs up PostgreSQL databases: dump, gzip, upload to MEGA, report to a webhook.
//! Each database is processed independently, so one failing target never stops
//! the others, and local artifacts are only removed once the next stage confirmed them.

pub mod config;
pub mod managers;
pub mod model;
pub mod stages;
pub mod storage;
pub mod targets;
pub mod utils;

// Re-export commonly used types
pub use config::{load_config, Config, ConfigError};
pub use managers::backup::{artifact_paths, BackupManager, BackupSettings, CancelFlag};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::NotificationManager;
pub use model::{DatabaseTarget, RunSummary, Stage, TargetOutcome, TargetState};
pub use targets::TargetSource;
