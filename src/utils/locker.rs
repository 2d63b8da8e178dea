//! File-based locking to prevent two runs from sharing a work directory

use anyhow::{Context, Result};
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the lock file created inside the work directory
pub const LOCK_FILE_NAME: &str = ".db-backup-manager.lock";

/// Lock file path for a work directory
pub fn lock_path(work_dir: &Path) -> PathBuf {
    work_dir.join(LOCK_FILE_NAME)
}

/// Run `f` while holding an exclusive lock on `work_dir`
///
/// Returns an error without running `f` if another process holds the lock.
/// The lock is released when `f` returns, on every path.
pub fn with_run_lock<T>(work_dir: &Path, f: impl FnOnce() -> T) -> Result<T> {
    let path = lock_path(work_dir);

    debug!("Attempting to acquire lock: {:?}", path);

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file: {:?}", path))?;

    let mut lock = RwLock::new(file);
    let _guard = lock.try_write().with_context(|| {
        format!(
            "Work directory {:?} is already in use by another backup run (lock held)",
            work_dir
        )
    })?;

    info!("Acquired run lock: {:?}", path);
    let result = f();
    debug!("Releasing run lock: {:?}", path);

    Ok(result)
}
