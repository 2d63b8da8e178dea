//! Cleanup, preservation, isolation, naming and soft-notification guarantees

use chrono::{Local, TimeZone};
use db_backup_manager::artifact_paths;
use std::path::Path;
use std::sync::Arc;
use test_utils::{
    targets, EventStatus, MockCompressStage, MockDumpStage, MockNotifier, MockUploadStage,
    OptionAssertions, Stage, TargetState, TestContext, UploadFailureMode,
};

#[test]
fn test_success_leaves_no_local_artifacts() {
    let ctx = TestContext::new();
    let manager = ctx.manager(MockDumpStage::new(), MockCompressStage::new(), MockUploadStage::new());

    let summary = manager.run(&targets(&["alpha", "beta", "gamma"])).unwrap();

    assert!(summary.all_succeeded());
    assert!(ctx.work_files().is_empty());
    for outcome in &summary.outcomes {
        assert!(outcome.remote_reference.is_some());
        assert!(outcome.preserved_artifact.is_none());
    }
}

#[test]
fn test_failure_preserves_the_failed_stage_input() {
    let ctx = TestContext::new();
    let manager = ctx.manager(
        MockDumpStage::new(),
        MockCompressStage::new().with_failure("compress_fails"),
        MockUploadStage::new().with_failure("upload_fails", UploadFailureMode::Transfer),
    );

    let summary = manager
        .run(&targets(&["compress_fails", "upload_fails", "fine"]))
        .unwrap();

    let compress = summary.outcome_for("compress_fails").assert_some();
    assert_eq!(compress.final_state, TargetState::Failed(Stage::Compress));
    let dump = compress.preserved_path().assert_some();
    assert!(dump.exists());
    assert!(dump.to_string_lossy().ends_with(".dump"));

    let upload = summary.outcome_for("upload_fails").assert_some();
    assert_eq!(upload.final_state, TargetState::Failed(Stage::Upload));
    assert!(upload.preserved_path().assert_some().exists());

    assert_eq!(summary.state_of("fine"), Some(TargetState::Done));
    assert!(ctx.work_files_for("fine").is_empty());
    assert_eq!(ctx.work_files().len(), 2);
}

#[test]
fn test_every_target_attempted_whatever_fails() {
    let ctx = TestContext::new();
    let dump = MockDumpStage::new()
        .with_failure("t1")
        .with_empty_output("t3");
    let manager = ctx.manager(
        dump.clone(),
        MockCompressStage::new().with_failure("t4"),
        MockUploadStage::new().with_failure("t5", UploadFailureMode::Authentication),
    );

    let ids = ["t1", "t2", "t3", "t4", "t5", "t6"];
    let summary = manager.run(&targets(&ids)).unwrap();

    assert_eq!(dump.dumped(), ids);
    assert_eq!(summary.state_of("t1"), Some(TargetState::Failed(Stage::Dump)));
    assert_eq!(summary.state_of("t3"), Some(TargetState::Failed(Stage::Dump)));
    assert_eq!(summary.state_of("t4"), Some(TargetState::Failed(Stage::Compress)));
    assert_eq!(summary.state_of("t5"), Some(TargetState::Failed(Stage::Upload)));
    assert_eq!(summary.succeeded_count(), 2);
}

#[test]
fn test_artifact_names_are_deterministic() {
    let timestamp = Local.with_ymd_and_hms(2024, 5, 1, 3, 0, 0).unwrap();
    let first = artifact_paths(Path::new("/work"), "sales", timestamp);
    let second = artifact_paths(Path::new("/work"), "sales", timestamp);
    let other = artifact_paths(Path::new("/work"), "crm", timestamp);

    assert_eq!(first, second);
    assert_ne!(first.dump, other.dump);
    assert_eq!(
        first.dump,
        Path::new("/work").join("sales_2024-05-01_03-00-00.dump")
    );
    assert_eq!(
        first.archive,
        Path::new("/work").join("sales_2024-05-01_03-00-00.dump.gz")
    );
}

#[test]
fn test_notification_never_changes_state() {
    let ctx = TestContext::new();
    let notifier = MockNotifier::new();
    let manager = ctx
        .manager(
            MockDumpStage::new().with_failure("bad"),
            MockCompressStage::new(),
            MockUploadStage::new(),
        )
        .with_notifier(Arc::new(notifier.clone()));

    let summary = manager.run(&targets(&["good", "bad"])).unwrap();

    let events = notifier.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].target.id, "good");
    assert_eq!(events[0].status, EventStatus::Success);
    assert!(events[0].detail.contains("good_"));
    assert_eq!(events[1].status, EventStatus::Failure);
    assert!(events[1].detail.contains("FAILED(dump)"));

    assert_eq!(summary.state_of("good"), Some(TargetState::Done));
    assert_eq!(summary.state_of("bad"), Some(TargetState::Failed(Stage::Dump)));
}

#[test]
fn test_explicit_targets_with_same_file_name_do_not_share_artifacts() {
    use db_backup_manager::targets::StaticSource;

    let ctx = TestContext::new().with_concurrency(2);
    let manager = ctx.manager(
        MockDumpStage::new(),
        MockCompressStage::new().with_failure("sales db"),
        MockUploadStage::new(),
    );
    let source = StaticSource::new(targets(&["sales db", "sales_db", "sales db"]));

    let summary = manager.run_from_source(&source).unwrap();

    assert_eq!(summary.len(), 3);
    assert_eq!(summary.state_of("sales_db"), Some(TargetState::Done));
    let preserved: Vec<_> = summary
        .outcomes
        .iter()
        .filter(|o| o.target.id == "sales db")
        .map(|o| o.preserved_path().unwrap().to_path_buf())
        .collect();
    assert_eq!(preserved.len(), 2);
    assert_ne!(preserved[0], preserved[1]);
    for path in &preserved {
        assert!(path.exists(), "{:?} missing", path);
    }
    assert_eq!(ctx.work_files().len(), 2);
}
