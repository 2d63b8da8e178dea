//! Stopping a run between targets

use db_backup_manager::model::{DatabaseTarget, DumpArtifact};
use db_backup_manager::stages::{DumpFailure, DumpStage};
use db_backup_manager::CancelFlag;
use std::path::Path;
use test_utils::{
    targets, MockCompressStage, MockDumpStage, MockUploadStage, TargetState, TestContext,
};

/// Requests cancellation while dumping the given target
struct CancellingDump {
    inner: MockDumpStage,
    cancel_on: &'static str,
    flag: CancelFlag,
}

impl DumpStage for CancellingDump {
    fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure> {
        if target.id == self.cancel_on {
            self.flag.cancel();
        }
        self.inner.dump(target, output_path)
    }
}

#[test]
fn test_in_flight_target_finishes_and_rest_are_cancelled() {
    let ctx = TestContext::new();
    let flag = CancelFlag::new();
    let dump = MockDumpStage::new();
    let upload = MockUploadStage::new();
    let manager = ctx
        .manager(
            CancellingDump {
                inner: dump.clone(),
                cancel_on: "b",
                flag: flag.clone(),
            },
            MockCompressStage::new(),
            upload.clone(),
        )
        .with_cancel_flag(flag);

    let summary = manager.run(&targets(&["a", "b", "c", "d"])).unwrap();

    assert_eq!(dump.dumped(), vec!["a", "b"]);
    assert_eq!(upload.uploaded(), vec!["a", "b"]);
    assert_eq!(summary.state_of("a"), Some(TargetState::Done));
    assert_eq!(summary.state_of("b"), Some(TargetState::Done));
    assert_eq!(summary.state_of("c"), Some(TargetState::Cancelled));
    assert_eq!(summary.state_of("d"), Some(TargetState::Cancelled));
    assert!(!summary.all_succeeded());
    assert_eq!(summary.failed_count(), 2);
    assert!(ctx.work_files().is_empty());
}

#[test]
fn test_cancelled_targets_are_not_notified() {
    let ctx = TestContext::new();
    let notifier = test_utils::MockNotifier::new();
    let manager = ctx
        .manager_with(MockDumpStage::new())
        .with_notifier(std::sync::Arc::new(notifier.clone()));

    manager.cancel_flag().cancel();
    let summary = manager.run(&targets(&["a", "b"])).unwrap();

    assert!(notifier.events().is_empty());
    for outcome in &summary.outcomes {
        assert_eq!(outcome.final_state, TargetState::Cancelled);
        assert!(!outcome.notified);
        assert!(outcome.error.is_some());
    }
}
