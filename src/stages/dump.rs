//! Dump stage: run the database dump command for one target

use crate::config::DumpFormat;
use crate::model::{DatabaseTarget, DumpArtifact};
use crate::utils::command::CommandError;
use crate::utils::CommandExecutor;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DumpFailure {
    #[error("dump command exited with code {exit_code:?}: {stderr_tail}")]
    NonZeroExit {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("dump command succeeded but produced no data at {path:?}")]
    EmptyOutput {
        path: PathBuf,
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("failed to run dump command: {reason}")]
    Launch { reason: String },

    #[error("dump command timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
}

impl DumpFailure {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            DumpFailure::NonZeroExit { exit_code, .. }
            | DumpFailure::EmptyOutput { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

impl From<CommandError> for DumpFailure {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::TimedOut { timeout, .. } => DumpFailure::TimedOut { timeout },
            other => DumpFailure::Launch {
                reason: other.to_string(),
            },
        }
    }
}

/// Produces a dump artifact for one database
pub trait DumpStage: Send + Sync {
    fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure>;
}

/// Size of a file, `None` if it is missing or unreadable
pub fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// `pg_dump` invoked through a [`CommandExecutor`]
pub struct PgDumpStage {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    format: DumpFormat,
    timeout: Duration,
}

impl PgDumpStage {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        program: impl Into<String>,
        format: DumpFormat,
        timeout: Duration,
    ) -> Self {
        Self {
            executor,
            program: program.into(),
            format,
            timeout,
        }
    }

    /// Arguments passed to the dump program
    pub fn build_args(&self, target: &DatabaseTarget, output_path: &Path) -> Vec<String> {
        vec![
            format!("--file={}", output_path.display()),
            format!("--format={}", self.format.as_arg()),
            "--no-password".to_string(),
            format!("--dbname={}", target.connection),
        ]
    }

    fn discard_partial_output(output_path: &Path) {
        if output_path.exists() {
            match fs::remove_file(output_path) {
                Ok(()) => debug!("Removed partial dump output: {:?}", output_path),
                Err(e) => warn!("Failed to remove partial dump output {:?}: {}", output_path, e),
            }
        }
    }
}

impl DumpStage for PgDumpStage {
    fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure> {
        info!("Dumping database '{}' to {:?}", target.id, output_path);

        let args = self.build_args(target, output_path);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = match self
            .executor
            .run_command(&self.program, &arg_refs, None, Some(self.timeout))
        {
            Ok(output) => output,
            Err(e) => {
                Self::discard_partial_output(output_path);
                return Err(e.into());
            }
        };

        if !output.success() {
            Self::discard_partial_output(output_path);
            return Err(DumpFailure::NonZeroExit {
                exit_code: output.exit_code,
                stderr_tail: output.stderr_tail(),
            });
        }

        match file_size(output_path) {
            Some(size) if size > 0 => {
                info!("Dump of '{}' complete ({} bytes)", target.id, size);
                Ok(DumpArtifact {
                    path: output_path.to_path_buf(),
                    target: target.clone(),
                    created_at: Local::now(),
                })
            }
            _ => {
                Self::discard_partial_output(output_path);
                Err(DumpFailure::EmptyOutput {
                    path: output_path.to_path_buf(),
                    exit_code: output.exit_code,
                    stderr_tail: output.stderr_tail(),
                })
            }
        }
    }
}
