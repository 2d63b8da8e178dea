//! Pipeline data model
//!
//! Values that flow between the stages of a backup run:
//! target -> dump artifact -> archive artifact -> upload result -> notification.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One database to back up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    /// Identifier used in file names, logs and notifications
    pub id: String,
    /// Connection descriptor handed to the dump command (opaque to the pipeline)
    pub connection: String,
}

impl DatabaseTarget {
    pub fn new(id: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connection: connection.into(),
        }
    }

    /// Target id reduced to characters that are safe in a file name
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        if stem.is_empty() || stem.chars().all(|c| c == '.') {
            "unnamed".to_string()
        } else {
            stem
        }
    }
}

impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Raw output of the dump command, living on local disk until compressed
#[derive(Debug, Clone)]
pub struct DumpArtifact {
    pub path: PathBuf,
    pub target: DatabaseTarget,
    pub created_at: DateTime<Local>,
}

/// Compressed dump, living on local disk until the upload is confirmed
#[derive(Debug, Clone)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub source: DumpArtifact,
}

impl ArchiveArtifact {
    pub fn target(&self) -> &DatabaseTarget {
        &self.source.target
    }
}

#[derive(Debug, Clone)]
pub struct UploadResult {
    pub remote_reference: String,
    pub target: DatabaseTarget,
    pub succeeded: bool,
}

/// Outcome reported to the notification channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub target: DatabaseTarget,
    pub status: EventStatus,
    pub detail: String,
}

/// Stage of the per-target pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Dump,
    Compress,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Dump => "dump",
            Stage::Compress => "compress",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Per-target state machine
///
/// `Pending -> Dumping -> Compressing -> Uploading -> Done`, with `Failed(stage)`
/// reachable from each working state. `Cancelled` marks targets that never
/// started because the run was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Dumping,
    Compressing,
    Uploading,
    Done,
    Failed(Stage),
    Cancelled,
}

impl TargetState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TargetState::Done | TargetState::Failed(_) | TargetState::Cancelled
        )
    }

    /// State entered when the given stage fails
    pub fn failed_at(self) -> Option<TargetState> {
        match self {
            TargetState::Dumping => Some(TargetState::Failed(Stage::Dump)),
            TargetState::Compressing => Some(TargetState::Failed(Stage::Compress)),
            TargetState::Uploading => Some(TargetState::Failed(Stage::Upload)),
            _ => None,
        }
    }

    /// State entered when the current stage succeeds
    pub fn advance(self) -> TargetState {
        match self {
            TargetState::Pending => TargetState::Dumping,
            TargetState::Dumping => TargetState::Compressing,
            TargetState::Compressing => TargetState::Uploading,
            TargetState::Uploading => TargetState::Done,
            terminal => terminal,
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetState::Pending => f.write_str("PENDING"),
            TargetState::Dumping => f.write_str("DUMPING"),
            TargetState::Compressing => f.write_str("COMPRESSING"),
            TargetState::Uploading => f.write_str("UPLOADING"),
            TargetState::Done => f.write_str("DONE"),
            TargetState::Failed(stage) => write!(f, "FAILED({})", stage),
            TargetState::Cancelled => f.write_str("CANCELLED"),
        }
    }
}

/// Final record for one target in a run
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: DatabaseTarget,
    pub final_state: TargetState,
    pub error: Option<String>,
    pub remote_reference: Option<String>,
    /// Input artifact left on disk by a failed stage
    pub preserved_artifact: Option<PathBuf>,
    pub notified: bool,
    pub duration: Duration,
}

impl TargetOutcome {
    pub fn cancelled(target: DatabaseTarget) -> Self {
        Self {
            target,
            final_state: TargetState::Cancelled,
            error: Some("run cancelled before this target started".to_string()),
            remote_reference: None,
            preserved_artifact: None,
            notified: false,
            duration: Duration::ZERO,
        }
    }

    pub fn is_done(&self) -> bool {
        self.final_state == TargetState::Done
    }

    pub fn preserved_path(&self) -> Option<&Path> {
        self.preserved_artifact.as_deref()
    }
}

/// Ordered per-target outcomes of one orchestrator run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TargetOutcome>,
}

impl RunSummary {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(TargetOutcome::is_done)
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_done()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    /// Outcomes that did not reach `Done`
    pub fn failed(&self) -> impl Iterator<Item = &TargetOutcome> {
        self.outcomes.iter().filter(|o| !o.is_done())
    }

    pub fn outcome_for(&self, target_id: &str) -> Option<&TargetOutcome> {
        self.outcomes.iter().find(|o| o.target.id == target_id)
    }

    pub fn state_of(&self, target_id: &str) -> Option<TargetState> {
        self.outcome_for(target_id).map(|o| o.final_state)
    }
}
