//! Mock stage implementations for testing
//! Available for use in external test crates

#![allow(dead_code)]

use super::*;
use crate::model::{ArchiveArtifact, DatabaseTarget, DumpArtifact, NotificationEvent, UploadResult};
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Dump stage writing synthetic dump files
#[derive(Clone)]
pub struct MockDumpStage {
    /// Target ids in the order they were dumped
    pub calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    empty_output: Arc<Mutex<HashSet<String>>>,
    sizes: Arc<Mutex<HashMap<String, usize>>>,
    default_size: usize,
}

impl Default for MockDumpStage {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            failing: Arc::default(),
            empty_output: Arc::default(),
            sizes: Arc::default(),
            default_size: 4096,
        }
    }
}

impl MockDumpStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the dump command exit with code 1 for this target, producing nothing
    pub fn with_failure(self, target_id: &str) -> Self {
        self.failing.lock().unwrap().insert(target_id.to_string());
        self
    }

    /// Make the dump command "succeed" while writing a zero-byte file
    pub fn with_empty_output(self, target_id: &str) -> Self {
        self.empty_output
            .lock()
            .unwrap()
            .insert(target_id.to_string());
        self
    }

    /// Size in bytes of the dump written for this target
    pub fn with_size(self, target_id: &str, size: usize) -> Self {
        self.sizes.lock().unwrap().insert(target_id.to_string(), size);
        self
    }

    pub fn dumped(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_dumped(&self, target_id: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|id| id == target_id)
    }
}

/// Compressible, SQL-looking content of `size` bytes
pub fn synthetic_dump(target_id: &str, size: usize) -> Vec<u8> {
    let line = format!("INSERT INTO {}_events (id, payload) VALUES (42, 'backup-test-row');\n", target_id);
    line.bytes().cycle().take(size).collect()
}

impl DumpStage for MockDumpStage {
    fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure> {
        self.calls.lock().unwrap().push(target.id.clone());

        if self.failing.lock().unwrap().contains(&target.id) {
            return Err(DumpFailure::NonZeroExit {
                exit_code: Some(1),
                stderr_tail: format!("pg_dump: error: connection to database \"{}\" failed", target.id),
            });
        }

        let content = if self.empty_output.lock().unwrap().contains(&target.id) {
            Vec::new()
        } else {
            let size = self
                .sizes
                .lock()
                .unwrap()
                .get(&target.id)
                .copied()
                .unwrap_or(self.default_size);
            synthetic_dump(&target.id, size)
        };

        fs::write(output_path, content).map_err(|e| DumpFailure::Launch {
            reason: e.to_string(),
        })?;

        Ok(DumpArtifact {
            path: output_path.to_path_buf(),
            target: target.clone(),
            created_at: Local::now(),
        })
    }
}

/// Gzip compression that can be told to fail for chosen targets
#[derive(Clone, Default)]
pub struct MockCompressStage {
    pub calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    inner: GzipCompressStage,
}

impl MockCompressStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail compression for this target without touching its dump
    pub fn with_failure(self, target_id: &str) -> Self {
        self.failing.lock().unwrap().insert(target_id.to_string());
        self
    }

    pub fn compressed(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CompressStage for MockCompressStage {
    fn compress(&self, artifact: &DumpArtifact, output_path: &Path) -> Result<ArchiveArtifact, CompressFailure> {
        self.calls.lock().unwrap().push(artifact.target.id.clone());

        if self.failing.lock().unwrap().contains(&artifact.target.id) {
            return Err(CompressFailure::Io {
                context: format!("Failed to create archive {:?}", output_path),
                source: std::io::Error::new(std::io::ErrorKind::Other, "No space left on device"),
            });
        }

        self.inner.compress(artifact, output_path)
    }
}

/// How a mocked upload should fail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadFailureMode {
    Authentication,
    Transfer,
}

/// Upload stage honouring the real contract: the local file is removed only on success
#[derive(Clone, Default)]
pub struct MockUploadStage {
    /// Target ids whose upload was attempted
    pub calls: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashMap<String, UploadFailureMode>>>,
}

impl MockUploadStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure(self, target_id: &str, mode: UploadFailureMode) -> Self {
        self.failing
            .lock()
            .unwrap()
            .insert(target_id.to_string(), mode);
        self
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl UploadStage for MockUploadStage {
    fn upload(&self, artifact: &ArchiveArtifact) -> Result<UploadResult, UploadFailure> {
        let target = artifact.target();
        self.calls.lock().unwrap().push(target.id.clone());

        match self.failing.lock().unwrap().get(&target.id) {
            Some(UploadFailureMode::Authentication) => {
                return Err(UploadFailure::Authentication {
                    reason: "Login failed: invalid email or password".to_string(),
                })
            }
            Some(UploadFailureMode::Transfer) => {
                return Err(UploadFailure::Transfer {
                    reason: "connection reset by peer".to_string(),
                })
            }
            None => {}
        }

        let file_name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        fs::remove_file(&artifact.path).map_err(|_| UploadFailure::MissingArchive {
            path: artifact.path.clone(),
        })?;

        Ok(UploadResult {
            remote_reference: format!("/Backups/{}", file_name),
            target: target.clone(),
            succeeded: true,
        })
    }
}

/// Notifier recording every event it is given
#[derive(Clone, Default)]
pub struct MockNotifier {
    pub events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl NotifyStage for MockNotifier {
    fn notify(&self, event: &NotificationEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
