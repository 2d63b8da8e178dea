//! End-to-end runs over the reference scenarios

use db_backup_manager::model::{ArchiveArtifact, UploadResult};
use db_backup_manager::stages::{RemoteUploadStage, UploadFailure, UploadStage};
use db_backup_manager::storage::StorageCredentials;
use db_backup_manager::NotificationManager;
use httpmock::prelude::*;
use std::fs;
use std::sync::{Arc, Mutex};
use test_utils::{
    targets, EventStatus, MockCompressStage, MockDumpStage, MockNotifier, MockStorage,
    MockUploadStage, NotificationConfig, OptionAssertions, Stage, TargetState, TestContext,
    UploadFailureMode, TEN_MB,
};

/// What the upload stage saw on disk when it was called
#[derive(Debug, Clone)]
struct ArchiveObservation {
    archive_size: u64,
    dump_still_present: bool,
}

/// Upload stage recording the archive it receives before delegating
#[derive(Clone, Default)]
struct ObservingUpload {
    inner: MockUploadStage,
    seen: Arc<Mutex<Vec<ArchiveObservation>>>,
}

impl UploadStage for ObservingUpload {
    fn upload(&self, artifact: &ArchiveArtifact) -> Result<UploadResult, UploadFailure> {
        self.seen.lock().unwrap().push(ArchiveObservation {
            archive_size: fs::metadata(&artifact.path).map(|m| m.len()).unwrap_or(0),
            dump_still_present: artifact.source.path.exists(),
        });
        self.inner.upload(artifact)
    }
}

#[test]
fn test_failed_dump_does_not_stop_next_target() {
    let ctx = TestContext::new();
    let compress = MockCompressStage::new();
    let upload = MockUploadStage::new();
    let manager = ctx.manager(
        MockDumpStage::new().with_failure("A"),
        compress.clone(),
        upload.clone(),
    );

    let summary = manager.run(&targets(&["A", "B"])).unwrap();

    assert_eq!(summary.state_of("A"), Some(TargetState::Failed(Stage::Dump)));
    assert_eq!(summary.state_of("B"), Some(TargetState::Done));

    // Nothing was produced for A and nothing downstream ran for it
    assert!(ctx.work_files_for("A").is_empty());
    assert_eq!(compress.compressed(), vec!["B"]);
    assert_eq!(upload.uploaded(), vec!["B"]);
}

#[test]
fn test_large_dump_is_compressed_then_cleaned_up() {
    let ctx = TestContext::new();
    let upload = ObservingUpload::default();
    let manager = ctx.manager(
        MockDumpStage::new().with_size("A", TEN_MB),
        MockCompressStage::new(),
        upload.clone(),
    );

    let summary = manager.run(&targets(&["A"])).unwrap();

    assert_eq!(summary.state_of("A"), Some(TargetState::Done));

    let seen = upload.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].archive_size > 0);
    assert!((seen[0].archive_size as usize) < TEN_MB);
    assert!(!seen[0].dump_still_present, "raw dump must be gone before upload");

    assert!(ctx.work_files().is_empty(), "left behind: {:?}", ctx.work_files());
}

#[test]
fn test_webhook_error_does_not_fail_target() {
    let server = MockServer::start();
    let hook = server.mock(|when, then| {
        when.method(POST).path("/hook");
        then.status(500).body("boom");
    });

    let ctx = TestContext::new();
    let notifier = NotificationManager::new(NotificationConfig {
        webhook_url: server.url("/hook"),
        notify_on: vec![EventStatus::Success, EventStatus::Failure],
        timeout_seconds: 5,
        ..NotificationConfig::default()
    });
    let manager = ctx
        .manager(MockDumpStage::new(), MockCompressStage::new(), MockUploadStage::new())
        .with_notifier(Arc::new(notifier));

    let summary = manager.run(&targets(&["A"])).unwrap();

    hook.assert();
    let outcome = summary.outcome_for("A").assert_some();
    assert_eq!(outcome.final_state, TargetState::Done);
    assert!(outcome.notified);
    assert!(outcome.error.is_none());
}

#[test]
fn test_upload_auth_error_keeps_archive() {
    let ctx = TestContext::new();
    let manager = ctx.manager(
        MockDumpStage::new(),
        MockCompressStage::new(),
        MockUploadStage::new().with_failure("A", UploadFailureMode::Authentication),
    );

    let summary = manager.run(&targets(&["A"])).unwrap();
    let outcome = summary.outcome_for("A").assert_some();

    assert_eq!(outcome.final_state, TargetState::Failed(Stage::Upload));
    let archive = outcome.preserved_path().assert_some();
    assert!(archive.exists());
    assert!(archive.to_string_lossy().ends_with(".dump.gz"));
    assert_eq!(ctx.work_files_for("A").len(), 1);
}

#[test]
fn test_real_upload_stage_auth_error_keeps_archive() {
    let ctx = TestContext::new();
    let storage = MockStorage::new().with_failing_login();
    let upload = RemoteUploadStage::new(
        storage.clone(),
        StorageCredentials::new("backup@example.com", "wrong"),
    );
    let manager = ctx.manager(MockDumpStage::new(), MockCompressStage::new(), upload);

    let summary = manager.run(&targets(&["A", "B"])).unwrap();

    assert_eq!(summary.failed_count(), 2);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.final_state == TargetState::Failed(Stage::Upload)));
    assert_eq!(storage.upload_count(), 0);
    assert_eq!(ctx.work_files().len(), 2);
}

#[test]
fn test_empty_target_list() {
    let ctx = TestContext::new();
    let notifier = MockNotifier::new();
    let manager = ctx
        .manager_with(MockDumpStage::new())
        .with_notifier(Arc::new(notifier.clone()));

    let summary = manager.run(&[]).unwrap();

    assert!(summary.is_empty());
    assert!(summary.all_succeeded());
    assert!(notifier.events().is_empty());
}
