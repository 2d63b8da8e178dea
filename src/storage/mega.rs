//! MEGA storage through the MEGAcmd command-line client

use super::{RemoteStorage, StorageCredentials, StorageSession};
use crate::stages::UploadFailure;
use crate::utils::command::{tail_lines, CommandOutput, STDERR_TAIL_LINES};
use crate::utils::CommandExecutor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const LOGIN_TIMEOUT: Duration = Duration::from_secs(120);

/// Remote storage backed by `mega-login` / `mega-put` / `mega-logout`
pub struct MegaCmdStorage {
    executor: Arc<dyn CommandExecutor>,
    remote_folder: String,
    upload_timeout: Duration,
}

impl MegaCmdStorage {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        remote_folder: impl Into<String>,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            remote_folder: remote_folder.into(),
            upload_timeout,
        }
    }

    /// Whether MEGAcmd already holds a session for `email`
    fn existing_session(&self, email: &str) -> bool {
        match self
            .executor
            .run_command("mega-whoami", &[], None, Some(LOGIN_TIMEOUT))
        {
            Ok(output) if output.success() => output
                .stdout
                .to_lowercase()
                .contains(&email.trim().to_lowercase()),
            _ => false,
        }
    }
}

/// Most useful diagnostic text of a failed MEGAcmd call (it reports errors on either stream)
fn failure_text(output: &CommandOutput) -> String {
    let stderr = output.stderr_tail();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = tail_lines(&output.stdout, STDERR_TAIL_LINES);
    if stdout.is_empty() {
        format!("exit code {:?}", output.exit_code)
    } else {
        stdout
    }
}

impl RemoteStorage for MegaCmdStorage {
    fn login(&self, credentials: &StorageCredentials) -> Result<Box<dyn StorageSession>, UploadFailure> {
        let owns_login = if self.existing_session(&credentials.email) {
            info!("Reusing existing MEGA session for {}", credentials.email);
            false
        } else {
            info!("Logging in to MEGA as {}", credentials.email);
            let output = self
                .executor
                .run_command(
                    "mega-login",
                    &[credentials.email.as_str(), credentials.password.as_str()],
                    None,
                    Some(LOGIN_TIMEOUT),
                )
                .map_err(|e| UploadFailure::Authentication {
                    reason: e.to_string(),
                })?;

            if !output.success() {
                return Err(UploadFailure::Authentication {
                    reason: failure_text(&output),
                });
            }
            true
        };

        Ok(Box::new(MegaSession {
            executor: self.executor.clone(),
            remote_folder: self.remote_folder.trim_end_matches('/').to_string(),
            upload_timeout: self.upload_timeout,
            owns_login,
        }))
    }
}

struct MegaSession {
    executor: Arc<dyn CommandExecutor>,
    remote_folder: String,
    upload_timeout: Duration,
    owns_login: bool,
}

impl StorageSession for MegaSession {
    fn upload(&self, path: &Path) -> Result<String, UploadFailure> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| UploadFailure::Transfer {
                reason: format!("not a file path: {:?}", path),
            })?;

        let local = path.to_string_lossy().to_string();
        let destination = format!("{}/", self.remote_folder);

        // mega-put blocks until the transfer is acknowledged by the server
        let output = self
            .executor
            .run_command(
                "mega-put",
                &["-c", local.as_str(), destination.as_str()],
                None,
                Some(self.upload_timeout),
            )
            .map_err(|e| UploadFailure::Transfer {
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(UploadFailure::Transfer {
                reason: failure_text(&output),
            });
        }

        Ok(format!("{}/{}", self.remote_folder, file_name))
    }
}

impl Drop for MegaSession {
    fn drop(&mut self) {
        if !self.owns_login {
            return;
        }
        match self
            .executor
            .run_command("mega-logout", &[], None, Some(LOGIN_TIMEOUT))
        {
            Ok(output) if output.success() => debug!("Logged out of MEGA"),
            Ok(output) => warn!("MEGA logout failed: {}", failure_text(&output)),
            Err(e) => warn!("MEGA logout failed: {}", e),
        }
    }
}
