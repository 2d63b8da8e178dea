//! Test utilities for db-backup-manager
//!
//! This crate provides shared test utilities, fixtures and helper functions for
//! testing the backup pipeline with mocked stages.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{targets, MockDumpStage, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::new();
//!     let manager = ctx.manager_with(MockDumpStage::new().with_failure("a"));
//!     let summary = manager.run(&targets(&["a", "b"])).unwrap();
//!     // ... assertions
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use db_backup_manager::config::{
    CompressionConfig, Config, DatabaseConfig, GlobalConfig, NotificationConfig, StorageConfig,
    TargetSourceConfig, TargetSourceKind,
};
pub use db_backup_manager::model::{
    DatabaseTarget, EventStatus, NotificationEvent, RunSummary, Stage, TargetOutcome, TargetState,
};
pub use db_backup_manager::{BackupManager, BackupSettings};

// Re-export mock implementations from the main crate
pub use db_backup_manager::stages::mock::{
    synthetic_dump, MockCompressStage, MockDumpStage, MockNotifier, MockUploadStage,
    UploadFailureMode,
};
pub use db_backup_manager::storage::mock::MockStorage;
pub use db_backup_manager::utils::executor::mock::{MockExecutor, MockResponse};
pub use db_backup_manager::utils::executor::CommandExecutor;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
