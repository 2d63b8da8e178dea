//! Test context and harness for pipeline testing
//!
//! Provides a work directory plus helpers to wire a [`BackupManager`] from mocks.

use anyhow::Result;
use db_backup_manager::stages::mock::{MockCompressStage, MockDumpStage, MockUploadStage};
use db_backup_manager::stages::{CompressStage, DumpStage, UploadStage};
use db_backup_manager::utils::locker::LOCK_FILE_NAME;
use db_backup_manager::{BackupManager, BackupSettings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Test context that manages test resources and provides common utilities
pub struct TestContext {
    /// Temporary directory for test files
    temp_dir: TempDir,
    work_dir: PathBuf,
    concurrency: usize,
}

impl TestContext {
    /// Create a new test context with a temporary directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let work_dir = temp_dir.path().join("work");

        Self {
            temp_dir,
            work_dir,
            concurrency: 1,
        }
    }

    /// Process targets with `concurrency` workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Get the temporary directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory the manager writes artifacts into
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn settings(&self) -> BackupSettings {
        BackupSettings::new(&self.work_dir, self.concurrency)
    }

    /// Manager over arbitrary stages
    pub fn manager(
        &self,
        dump: impl DumpStage + 'static,
        compress: impl CompressStage + 'static,
        upload: impl UploadStage + 'static,
    ) -> BackupManager {
        BackupManager::new(
            self.settings(),
            Arc::new(dump),
            Arc::new(compress),
            Arc::new(upload),
        )
    }

    /// Manager with default mocks everywhere except the dump stage
    pub fn manager_with(&self, dump: MockDumpStage) -> BackupManager {
        self.manager(dump, MockCompressStage::new(), MockUploadStage::new())
    }

    /// Artifact files currently in the work directory (lock file excluded), sorted
    pub fn work_files(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.work_dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name != LOCK_FILE_NAME)
            .collect();
        names.sort();
        names
    }

    /// Work files belonging to one target id
    pub fn work_files_for(&self, target_id: &str) -> Vec<String> {
        let prefix = format!("{}_", target_id);
        self.work_files()
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect()
    }

    /// Create a file in the temp dir
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Read a file from the temp directory
    pub fn read_file(&self, name: &str) -> Result<String> {
        let path = self.temp_dir.path().join(name);
        Ok(std::fs::read_to_string(path)?)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for assertion helpers
pub trait ResultAssertions<T> {
    /// Assert that the result is Ok and return the value
    fn assert_ok(self) -> T;

    /// Assert that the result is Err and the error message contains the given string
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(v) => v,
            Err(e) => panic!("Expected Ok, got Err: {}", e),
        }
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(v) => panic!("Expected Err containing '{}', got Ok: {:?}", needle, v),
            Err(e) => {
                let err_msg = e.to_string();
                assert!(
                    err_msg.contains(needle),
                    "Error '{}' does not contain '{}'",
                    err_msg,
                    needle
                );
            }
        }
    }
}

/// Extension trait for Option assertions
pub trait OptionAssertions<T> {
    /// Assert that the option is Some and return the value
    fn assert_some(self) -> T;

    /// Assert that the option is None
    fn assert_none(self);
}

impl<T: std::fmt::Debug> OptionAssertions<T> for Option<T> {
    fn assert_some(self) -> T {
        match self {
            Some(v) => v,
            None => panic!("Expected Some, got None"),
        }
    }

    fn assert_none(self) {
        if let Some(v) = self {
            panic!("Expected None, got Some: {:?}", v);
        }
    }
}
