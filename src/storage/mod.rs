//! Remote storage client abstraction
//!
//! The upload stage only needs two capabilities from remote storage: open an
//! authenticated session and push a file through it. Keeping them behind
//! traits lets a pooled, shared or mocked session be substituted freely.

mod mega;

pub use mega::MegaCmdStorage;

use crate::stages::UploadFailure;
use std::fmt;
use std::path::Path;

/// Account credentials for remote storage
#[derive(Clone)]
pub struct StorageCredentials {
    pub email: String,
    pub password: String,
}

impl StorageCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Remote storage client able to open sessions
pub trait RemoteStorage: Send + Sync {
    fn login(&self, credentials: &StorageCredentials) -> Result<Box<dyn StorageSession>, UploadFailure>;
}

/// Authenticated session
pub trait StorageSession: Send {
    /// Transfer a file and return its remote reference once the remote side confirmed it
    fn upload(&self, path: &Path) -> Result<String, UploadFailure>;
}

/// Mock implementation for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Recorded storage call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum StorageCall {
        Login { email: String },
        Upload { file_name: String },
    }

    /// Mock remote storage for testing
    #[derive(Clone, Default)]
    pub struct MockStorage {
        /// Recorded calls
        pub calls: Arc<Mutex<Vec<StorageCall>>>,
        /// Whether login should fail
        should_fail_login: Arc<Mutex<bool>>,
        /// File name fragments whose upload fails
        failing_uploads: Arc<Mutex<HashSet<String>>>,
        /// Uploaded file contents, by file name
        pub uploaded: Arc<Mutex<Vec<(String, u64)>>>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure login to fail with an authentication error
        pub fn with_failing_login(self) -> Self {
            *self.should_fail_login.lock().unwrap() = true;
            self
        }

        /// Configure uploads of files whose name contains `fragment` to fail
        pub fn with_failing_upload(self, fragment: &str) -> Self {
            self.failing_uploads
                .lock()
                .unwrap()
                .insert(fragment.to_string());
            self
        }

        pub fn get_calls(&self) -> Vec<StorageCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn login_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, StorageCall::Login { .. }))
                .count()
        }

        pub fn upload_count(&self) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| matches!(c, StorageCall::Upload { .. }))
                .count()
        }
    }

    impl RemoteStorage for MockStorage {
        fn login(&self, credentials: &StorageCredentials) -> Result<Box<dyn StorageSession>, UploadFailure> {
            self.calls.lock().unwrap().push(StorageCall::Login {
                email: credentials.email.clone(),
            });

            if *self.should_fail_login.lock().unwrap() {
                return Err(UploadFailure::Authentication {
                    reason: "invalid email or password".to_string(),
                });
            }

            Ok(Box::new(MockSession {
                storage: self.clone(),
            }))
        }
    }

    struct MockSession {
        storage: MockStorage,
    }

    impl StorageSession for MockSession {
        fn upload(&self, path: &Path) -> Result<String, UploadFailure> {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();

            self.storage.calls.lock().unwrap().push(StorageCall::Upload {
                file_name: file_name.clone(),
            });

            let fails = self
                .storage
                .failing_uploads
                .lock()
                .unwrap()
                .iter()
                .any(|fragment| file_name.contains(fragment.as_str()));
            if fails {
                return Err(UploadFailure::Transfer {
                    reason: format!("connection reset while sending {}", file_name),
                });
            }

            let size = std::fs::metadata(path)
                .map_err(|e| UploadFailure::Transfer {
                    reason: format!("cannot read {}: {}", file_name, e),
                })?
                .len();
            self.storage
                .uploaded
                .lock()
                .unwrap()
                .push((file_name.clone(), size));

            Ok(format!("/Backups/{}", file_name))
        }
    }
}
