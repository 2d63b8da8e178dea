//! Pipeline stages
//!
//! Each stage is a trait so the orchestrator can be driven by real
//! implementations (pg_dump, gzip, MEGA, webhook) or by the mocks in [`mock`].

pub mod compress;
pub mod dump;
pub mod mock;
pub mod upload;

pub use compress::{CompressFailure, CompressStage, GzipCompressStage};
pub use dump::{DumpFailure, DumpStage, PgDumpStage};
pub use upload::{RemoteUploadStage, UploadFailure, UploadStage};

use crate::model::NotificationEvent;

/// Best-effort status reporting; implementations swallow their own failures
pub trait NotifyStage: Send + Sync {
    fn notify(&self, event: &NotificationEvent);
}
