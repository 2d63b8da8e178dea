//! Unit tests for target sources and exclusion

use db_backup_manager::targets::{
    filter_excluded, source_from_config, JsonFileSource, TargetSource, CATALOG_QUERY,
};
use rstest::rstest;
use std::sync::Arc;
use test_utils::{
    ids_of, sample_db_json, targets, ConfigBuilder, DatabaseConfig, MockExecutor, MockResponse,
    TestContext,
};

#[rstest]
#[case("test", &["sales", "crm"])]
#[case("TEST", &["sales", "crm"])]
#[case("sal", &["crm", "my_test_db"])]
#[case("nothing-matches", &["sales", "crm", "my_test_db"])]
fn test_exclusion_patterns(#[case] pattern: &str, #[case] expected: &[&str]) {
    let kept = filter_excluded(
        targets(&["sales", "crm", "my_test_db"]),
        &[pattern.to_string()],
    );
    assert_eq!(ids_of(&kept), expected);
}

#[test]
fn test_file_source_with_default_exclusions() {
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .with_targets_json(sample_db_json())
        .with_database_host("db.internal", 5433)
        .persist();

    let source = source_from_config(&config, Arc::new(MockExecutor::new()));
    let loaded = source.load_targets().unwrap();

    assert_eq!(ids_of(&loaded), vec!["sales", "crm", "legacy"]);
    assert_eq!(
        loaded[0].connection,
        "postgresql://postgres@db.internal:5433/sales"
    );
    assert_eq!(
        loaded[2].connection,
        "postgresql://archive@old-host:5433/legacy"
    );
}

#[test]
fn test_file_source_missing_file() {
    let ctx = TestContext::new();
    let source = JsonFileSource::new(ctx.temp_dir().join("db.json"), DatabaseConfig::default());

    let err = source.load_targets().unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read target list"));
}

#[test]
fn test_catalog_source_through_config() {
    let executor = MockExecutor::new().expect(
        "psql",
        MockResponse::Success {
            stdout: "analytics\npostgres\nqa_test\n".to_string(),
            stderr: String::new(),
        },
    );
    let (config, _temp_dir) = ConfigBuilder::minimal()
        .with_catalog_source()
        .with_exclude_patterns(&["test", "postgres"])
        .persist();

    let source = source_from_config(&config, Arc::new(executor.clone()));
    let loaded = source.load_targets().unwrap();

    assert_eq!(ids_of(&loaded), vec!["analytics"]);
    assert!(source.describe().starts_with("catalog"));

    let calls = executor.calls_for("psql");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].args.contains(&"-At".to_string()));
    assert!(calls[0].args.contains(&CATALOG_QUERY.to_string()));
}

#[test]
fn test_catalog_failure_surfaces_as_error() {
    let executor = MockExecutor::new().expect("psql", MockResponse::Timeout);
    let (config, _temp_dir) = ConfigBuilder::minimal().with_catalog_source().persist();

    let source = source_from_config(&config, Arc::new(executor));
    assert!(source.load_targets().is_err());
}
