//! Upload stage: push an archive to remote storage and retire the local copy

use crate::model::{ArchiveArtifact, UploadResult};
use crate::storage::{RemoteStorage, StorageCredentials, StorageSession};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum UploadFailure {
    #[error("authentication with remote storage failed: {reason}")]
    Authentication { reason: String },

    #[error("transfer to remote storage failed: {reason}")]
    Transfer { reason: String },

    #[error("archive to upload is missing: {path:?}")]
    MissingArchive { path: PathBuf },
}

/// Transfers an archive artifact to remote storage
pub trait UploadStage: Send + Sync {
    fn upload(&self, artifact: &ArchiveArtifact) -> Result<UploadResult, UploadFailure>;
}

/// Upload stage over any [`RemoteStorage`], reusing one session for the whole run
///
/// The session is single-owner: uploads from parallel targets take turns on it.
pub struct RemoteUploadStage<S: RemoteStorage> {
    storage: S,
    credentials: StorageCredentials,
    session: Mutex<Option<Box<dyn StorageSession>>>,
}

impl<S: RemoteStorage> RemoteUploadStage<S> {
    pub fn new(storage: S, credentials: StorageCredentials) -> Self {
        Self {
            storage,
            credentials,
            session: Mutex::new(None),
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Option<Box<dyn StorageSession>>> {
        // A panic while holding the lock leaves at worst a stale session, which
        // the next failed transfer discards
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Close the shared session (logging out if this stage logged in)
    pub fn close(&self) {
        if self.lock_session().take().is_some() {
            debug!("Closed remote storage session");
        }
    }
}

impl<S: RemoteStorage> UploadStage for RemoteUploadStage<S> {
    fn upload(&self, artifact: &ArchiveArtifact) -> Result<UploadResult, UploadFailure> {
        let target = artifact.target();

        if !artifact.path.is_file() {
            return Err(UploadFailure::MissingArchive {
                path: artifact.path.clone(),
            });
        }

        let mut session_slot = self.lock_session();
        let session = match session_slot.take() {
            Some(session) => session,
            None => self.storage.login(&self.credentials)?,
        };

        info!("Uploading archive for '{}': {:?}", target.id, artifact.path);

        // A session that failed a transfer is dropped; the next target logs in again
        let remote_reference = session.upload(&artifact.path)?;
        *session_slot = Some(session);
        drop(session_slot);

        info!("Upload confirmed for '{}': {}", target.id, remote_reference);

        if let Err(e) = fs::remove_file(&artifact.path) {
            warn!(
                "Failed to remove local archive {:?} after upload: {}",
                artifact.path, e
            );
        }

        Ok(UploadResult {
            remote_reference,
            target: target.clone(),
            succeeded: true,
        })
    }
}
