//! Backup manager - orchestrates the per-database pipeline
//!
//! Every target walks `Dump -> Compress -> Upload` on its own, then the outcome
//! is reported to the notifier. A failing target is recorded and the run moves
//! on; only work-directory problems abort a run.

use crate::config::{Config, ConfigError};
use crate::model::{
    DatabaseTarget, DumpArtifact, EventStatus, NotificationEvent, RunSummary, TargetOutcome,
    TargetState,
};
use crate::stages::dump::file_size;
use crate::stages::{CompressStage, DumpStage, NotifyStage, UploadStage};
use crate::targets::TargetSource;
use crate::utils::locker::with_run_lock;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Timestamp format embedded in artifact file names
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Run-level settings taken from the configuration
#[derive(Debug, Clone)]
pub struct BackupSettings {
    /// Directory holding dump and archive files during the run
    pub work_dir: PathBuf,
    /// Number of targets processed in parallel
    pub concurrency: usize,
}

impl BackupSettings {
    pub fn new(work_dir: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            work_dir: work_dir.into(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            crate::config::expand_tilde(&config.global.work_dir),
            config.global.concurrency,
        )
    }
}

/// Shared stop request; targets that have not started when it is set are skipped
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Local file names used for one target's dump and archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dump: PathBuf,
    pub archive: PathBuf,
}

/// Name the dump and archive for `target_id` created at `timestamp`
///
/// `{sanitized id}_{%Y-%m-%d_%H-%M-%S}.dump` and the same name with `.gz` appended.
pub fn artifact_paths(work_dir: &Path, target_id: &str, timestamp: DateTime<Local>) -> ArtifactPaths {
    let stem = DatabaseTarget::new(target_id, "").file_stem();
    paths_for_stem(work_dir, &stem, timestamp)
}

fn paths_for_stem(work_dir: &Path, stem: &str, timestamp: DateTime<Local>) -> ArtifactPaths {
    let base = format!("{}_{}", stem, timestamp.format(TIMESTAMP_FORMAT));

    ArtifactPaths {
        dump: work_dir.join(format!("{}.dump", base)),
        archive: work_dir.join(format!("{}.dump.gz", base)),
    }
}

pub struct BackupManager {
    settings: BackupSettings,
    dump: Arc<dyn DumpStage>,
    compress: Arc<dyn CompressStage>,
    upload: Arc<dyn UploadStage>,
    notifier: Option<Arc<dyn NotifyStage>>,
    cancel: CancelFlag,
}

impl BackupManager {
    /// Create new backup manager
    pub fn new(
        settings: BackupSettings,
        dump: Arc<dyn DumpStage>,
        compress: Arc<dyn CompressStage>,
        upload: Arc<dyn UploadStage>,
    ) -> Self {
        Self {
            settings,
            dump,
            compress,
            upload,
            notifier: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Report every finished target to `notifier`
    pub fn with_notifier(mut self, notifier: Arc<dyn NotifyStage>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Share an existing stop request instead of a private one
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle used to stop the run between targets
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }

    /// Load targets from `source`, then run them
    pub fn run_from_source(&self, source: &dyn TargetSource) -> Result<RunSummary, ConfigError> {
        let targets = source
            .load_targets()
            .map_err(|e| ConfigError::TargetSource(format!("{:#}", e)))?;

        info!("Loaded {} database target(s) from {}", targets.len(), source.describe());
        self.run(&targets)
    }

    /// Back up every target and return one outcome per target, in input order
    pub fn run(&self, targets: &[DatabaseTarget]) -> Result<RunSummary, ConfigError> {
        let work_dir = &self.settings.work_dir;

        fs::create_dir_all(work_dir).map_err(|e| ConfigError::WorkDir {
            path: work_dir.clone(),
            reason: e.to_string(),
        })?;

        let summary = with_run_lock(work_dir, || self.run_locked(targets)).map_err(|e| {
            ConfigError::WorkDir {
                path: work_dir.clone(),
                reason: format!("{:#}", e),
            }
        })?;

        info!(
            "Backup run finished: {} succeeded, {} failed",
            summary.succeeded_count(),
            summary.failed_count()
        );

        Ok(summary)
    }

    fn run_locked(&self, targets: &[DatabaseTarget]) -> RunSummary {
        if targets.is_empty() {
            info!("No database targets to back up");
            return RunSummary::default();
        }

        let workers = self.settings.concurrency.clamp(1, targets.len());
        info!(
            "Starting backup of {} database(s) with {} worker(s)",
            targets.len(),
            workers
        );

        let stems = unique_stems(targets);
        let slots: Vec<Mutex<Option<TargetOutcome>>> =
            targets.iter().map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);

        let work = || loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let index = next.fetch_add(1, Ordering::SeqCst);
            let Some(target) = targets.get(index) else {
                break;
            };

            let outcome = self.process_target(target, &stems[index]);
            *slots[index]
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(outcome);
        };

        if workers == 1 {
            work();
        } else {
            thread::scope(|scope| {
                for _ in 0..workers {
                    scope.spawn(&work);
                }
            });
        }

        let outcomes = slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.into_inner()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .unwrap_or_else(|| {
                        warn!("Run cancelled before '{}' started", target.id);
                        TargetOutcome::cancelled(target.clone())
                    })
            })
            .collect();

        RunSummary { outcomes }
    }

    /// Drive one target through the pipeline and report the result
    fn process_target(&self, target: &DatabaseTarget, stem: &str) -> TargetOutcome {
        let started = Instant::now();
        let paths = paths_for_stem(&self.settings.work_dir, stem, Local::now());

        info!("Starting backup for database: {}", target.id);

        let mut outcome = TargetOutcome {
            target: target.clone(),
            final_state: TargetState::Pending,
            error: None,
            remote_reference: None,
            preserved_artifact: None,
            notified: false,
            duration: started.elapsed(),
        };

        let result = self.run_stages(target, &paths, &mut outcome);

        if let Err(message) = result {
            let failed = outcome.final_state.failed_at().unwrap_or(outcome.final_state);
            error!(
                "Backup of '{}' failed during {}: {}",
                target.id, outcome.final_state, message
            );
            if let Some(path) = &outcome.preserved_artifact {
                warn!("Keeping {:?} for inspection", path);
            }
            outcome.final_state = failed;
            outcome.error = Some(message);
        }

        outcome.duration = started.elapsed();
        self.report(&mut outcome);

        info!(
            "Finished '{}' as {} in {:.2}s",
            target.id,
            outcome.final_state,
            outcome.duration.as_secs_f64()
        );

        outcome
    }

    /// Advance `outcome.final_state` stage by stage; on error it holds the failing stage
    fn run_stages(
        &self,
        target: &DatabaseTarget,
        paths: &ArtifactPaths,
        outcome: &mut TargetOutcome,
    ) -> Result<(), String> {
        outcome.final_state = outcome.final_state.advance();
        debug!("'{}' -> {}", target.id, outcome.final_state);

        let dump = self
            .dump
            .dump(target, &paths.dump)
            .map_err(|e| e.to_string())?;
        let dump = confirm_dump(dump)?;

        outcome.final_state = outcome.final_state.advance();
        debug!("'{}' -> {}", target.id, outcome.final_state);

        let archive = match self.compress.compress(&dump, &paths.archive) {
            Ok(archive) => archive,
            Err(e) => {
                outcome.preserved_artifact = existing(&dump.path);
                return Err(e.to_string());
            }
        };
        retire(&dump.path);

        outcome.final_state = outcome.final_state.advance();
        debug!("'{}' -> {}", target.id, outcome.final_state);

        let uploaded = match self.upload.upload(&archive) {
            Ok(uploaded) if uploaded.succeeded => uploaded,
            Ok(_) => {
                outcome.preserved_artifact = existing(&archive.path);
                return Err("remote storage did not confirm the upload".to_string());
            }
            Err(e) => {
                outcome.preserved_artifact = existing(&archive.path);
                return Err(e.to_string());
            }
        };
        retire(&archive.path);

        outcome.remote_reference = Some(uploaded.remote_reference);
        outcome.final_state = outcome.final_state.advance();
        Ok(())
    }

    fn report(&self, outcome: &mut TargetOutcome) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        let (status, detail) = match outcome.final_state {
            TargetState::Done => (
                EventStatus::Success,
                outcome.remote_reference.clone().unwrap_or_default(),
            ),
            state => (
                EventStatus::Failure,
                format!("{}: {}", state, outcome.error.as_deref().unwrap_or("unknown error")),
            ),
        };

        notifier.notify(&NotificationEvent {
            target: outcome.target.clone(),
            status,
            detail,
        });
        outcome.notified = true;
    }
}

/// File stems for one run, one per target and never shared
///
/// Targets whose ids sanitize to the same stem (`sales db` and `sales_db`, or a
/// target listed twice) get a numeric suffix in input order.
fn unique_stems(targets: &[DatabaseTarget]) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut stems = Vec::with_capacity(targets.len());

    for target in targets {
        let base = target.file_stem();
        let mut stem = base.clone();
        let mut suffix = 2;
        while taken.contains(&stem) {
            stem = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        if stem != base {
            warn!(
                "Target '{}' shares its file name with another target, using '{}'",
                target.id, stem
            );
        }
        taken.insert(stem.clone());
        stems.push(stem);
    }

    stems
}

/// A dump is only handed on when its file exists and holds data
fn confirm_dump(dump: DumpArtifact) -> Result<DumpArtifact, String> {
    match file_size(&dump.path) {
        Some(size) if size > 0 => {
            debug!("Dump for '{}' is {} bytes", dump.target.id, size);
            Ok(dump)
        }
        Some(_) => {
            retire(&dump.path);
            Err(format!("dump reported success but {:?} is empty", dump.path))
        }
        None => Err(format!("dump reported success but {:?} does not exist", dump.path)),
    }
}

fn existing(path: &Path) -> Option<PathBuf> {
    path.exists().then(|| path.to_path_buf())
}

/// Remove an artifact whose consumer succeeded, if the consumer left it behind
fn retire(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed consumed artifact {:?}", path),
        Err(e) => warn!("Failed to remove consumed artifact {:?}: {}", path, e),
    }
}
