//! Bounded worker pool behaviour

use db_backup_manager::model::{DatabaseTarget, DumpArtifact};
use db_backup_manager::stages::{DumpFailure, DumpStage};
use rstest::rstest;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use test_utils::{
    targets, MockCompressStage, MockDumpStage, MockUploadStage, Stage, TargetState, TestContext,
};

/// Dump stage tracking how many dumps run at the same time
#[derive(Clone, Default)]
struct OverlapTrackingDump {
    inner: MockDumpStage,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl DumpStage for OverlapTrackingDump {
    fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        let result = self.inner.dump(target, output_path);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(4)]
fn test_summary_order_matches_input(#[case] concurrency: usize) {
    let ctx = TestContext::new().with_concurrency(concurrency);
    let manager = ctx.manager(
        MockDumpStage::new().with_failure("db3"),
        MockCompressStage::new(),
        MockUploadStage::new(),
    );

    let ids = ["db0", "db1", "db2", "db3", "db4", "db5", "db6", "db7"];
    let summary = manager.run(&targets(&ids)).unwrap();

    let order: Vec<&str> = summary.outcomes.iter().map(|o| o.target.id.as_str()).collect();
    assert_eq!(order, ids);
    assert_eq!(summary.succeeded_count(), 7);
    assert_eq!(summary.state_of("db3"), Some(TargetState::Failed(Stage::Dump)));
    assert!(ctx.work_files().is_empty());
}

#[test]
fn test_workers_bounded_by_concurrency() {
    let ctx = TestContext::new().with_concurrency(2);
    let dump = OverlapTrackingDump::default();
    let manager = ctx.manager(dump.clone(), MockCompressStage::new(), MockUploadStage::new());

    let summary = manager
        .run(&targets(&["a", "b", "c", "d", "e", "f"]))
        .unwrap();

    assert!(summary.all_succeeded());
    let peak = dump.peak.load(Ordering::SeqCst);
    assert!(peak >= 1 && peak <= 2, "peak concurrency was {}", peak);
}

#[test]
fn test_sequential_by_default() {
    let ctx = TestContext::new();
    let dump = OverlapTrackingDump::default();
    let manager = ctx.manager(dump.clone(), MockCompressStage::new(), MockUploadStage::new());

    manager.run(&targets(&["a", "b", "c"])).unwrap();

    assert_eq!(dump.peak.load(Ordering::SeqCst), 1);
    assert_eq!(dump.inner.dumped(), vec!["a", "b", "c"]);
}

#[test]
fn test_parallel_failures_stay_isolated() {
    let ctx = TestContext::new().with_concurrency(3);
    let manager = ctx.manager(
        MockDumpStage::new(),
        MockCompressStage::new().with_failure("b").with_failure("e"),
        MockUploadStage::new(),
    );

    let summary = manager
        .run(&targets(&["a", "b", "c", "d", "e", "f"]))
        .unwrap();

    assert_eq!(summary.failed_count(), 2);
    for id in ["b", "e"] {
        let outcome = summary.outcome_for(id).unwrap();
        assert_eq!(outcome.final_state, TargetState::Failed(Stage::Compress));
        assert!(outcome.preserved_path().unwrap().exists());
    }
    assert_eq!(ctx.work_files().len(), 2);
}

#[test]
fn test_concurrent_run_on_same_work_dir_is_rejected() {
    let ctx = TestContext::new();
    let release = Arc::new(std::sync::Barrier::new(2));

    /// Dump stage that parks until the test has tried a second run
    struct ParkingDump {
        inner: MockDumpStage,
        barrier: Arc<std::sync::Barrier>,
    }

    impl DumpStage for ParkingDump {
        fn dump(&self, target: &DatabaseTarget, output_path: &Path) -> Result<DumpArtifact, DumpFailure> {
            self.barrier.wait();
            self.barrier.wait();
            self.inner.dump(target, output_path)
        }
    }

    let first = ctx.manager(
        ParkingDump {
            inner: MockDumpStage::new(),
            barrier: release.clone(),
        },
        MockCompressStage::new(),
        MockUploadStage::new(),
    );
    let second = ctx.manager_with(MockDumpStage::new());

    thread::scope(|scope| {
        let handle = scope.spawn(|| first.run(&targets(&["a"])));

        // First run is inside its dump, holding the lock
        release.wait();
        let err = second.run(&targets(&["b"])).unwrap_err();
        assert!(err.to_string().contains("already in use"), "{}", err);
        release.wait();

        let summary = handle.join().unwrap().unwrap();
        assert!(summary.all_succeeded());
    });
}
