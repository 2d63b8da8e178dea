//! Unit tests for configuration loading and validation

use db_backup_manager::config::{
    load_config_with_env, parse_config, validate_config, validate_for_run, ConfigError, DumpFormat,
    ENV_DB_HOST, ENV_MEGA_EMAIL, ENV_MEGA_PASSWORD, ENV_WEBHOOK_URL,
};
use db_backup_manager::BackupSettings;
use std::collections::HashMap;
use std::fs;
use test_utils::{full_config_toml, render_config_toml, ConfigBuilder, EventStatus, TargetSourceKind, TestContext};

fn no_env(_: &str) -> Option<String> {
    None
}

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_config_loading_valid() {
    let (path, _, _temp_dir) = ConfigBuilder::minimal().with_concurrency(2).persist_to_file();

    let loaded = load_config_with_env(Some(&path), no_env);
    assert!(loaded.is_ok(), "Config should load successfully: {:?}", loaded.err());

    let config = loaded.unwrap();
    assert_eq!(config.global.concurrency, 2);
    assert!(validate_for_run(&config).is_ok());
}

#[test]
fn test_full_config_parses_every_section() {
    let config = parse_config(full_config_toml()).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.global.concurrency, 4);
    assert_eq!(config.global.exclude_patterns, vec!["test", "scratch"]);
    assert_eq!(config.database.port, 5433);
    assert_eq!(config.database.dump_format, DumpFormat::Plain);
    assert_eq!(config.database.maintenance_db, "template_admin");
    assert_eq!(config.compression.level, 9);
    assert_eq!(config.storage.remote_folder, "/Backups/prod");
    assert_eq!(config.notifications.notify_on, vec![EventStatus::Failure]);
    assert_eq!(config.targets.source, TargetSourceKind::Catalog);
}

#[test]
fn test_rendered_template_loads() {
    let ctx = TestContext::new();
    let work_dir = ctx.temp_dir().join("work");
    let log_dir = ctx.temp_dir().join("logs");
    let targets_file = ctx.create_file("db.json", r#"["sales"]"#);

    let toml = render_config_toml(
        &work_dir.to_string_lossy(),
        &log_dir.to_string_lossy(),
        &targets_file.to_string_lossy(),
    );
    let path = ctx.create_file("config.toml", &toml);

    let config = load_config_with_env(Some(&path), no_env).unwrap();
    assert_eq!(config.global.work_dir, work_dir);
    assert_eq!(config.targets.source, TargetSourceKind::File);
}

#[test]
fn test_environment_beats_file() {
    let (path, _, _temp_dir) = ConfigBuilder::minimal().persist_to_file();

    let config = load_config_with_env(
        Some(&path),
        env(&[
            (ENV_MEGA_EMAIL, "env@example.com"),
            (ENV_WEBHOOK_URL, "https://hooks.example.com/x"),
            (ENV_DB_HOST, "replica.internal"),
        ]),
    )
    .unwrap();

    assert_eq!(config.storage.email, "env@example.com");
    assert_eq!(config.storage.password, "mega-secret");
    assert_eq!(config.notifications.webhook_url, "https://hooks.example.com/x");
    assert_eq!(config.database.host, "replica.internal");
}

#[test]
fn test_missing_credentials_only_matter_for_runs() {
    let (path, _, _temp_dir) = ConfigBuilder::new().with_target_names(&["a"]).persist_to_file();

    let config = load_config_with_env(Some(&path), no_env).unwrap();
    match validate_for_run(&config) {
        Err(ConfigError::MissingCredential(name)) => assert_eq!(name, ENV_MEGA_EMAIL),
        other => panic!("expected missing credential, got {:?}", other),
    }

    let config = load_config_with_env(
        Some(&path),
        env(&[(ENV_MEGA_EMAIL, "a@b.c"), (ENV_MEGA_PASSWORD, "pw")]),
    )
    .unwrap();
    assert!(validate_for_run(&config).is_ok());
}

#[test]
fn test_malformed_file_is_parse_error() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", "[global\nconcurrency = ");

    let err = load_config_with_env(Some(&path), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_missing_file_is_read_error() {
    let ctx = TestContext::new();
    let err = load_config_with_env(Some(&ctx.temp_dir().join("absent.toml")), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::ReadError(_)));
}

#[test]
fn test_invalid_webhook_url_rejected() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "config.toml",
        "[notifications]\nwebhook_url = \"not a url\"\n",
    );

    let err = load_config_with_env(Some(&path), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError(_)));
}

#[test]
fn test_backup_settings_from_config() {
    let (config, temp_dir) = ConfigBuilder::minimal().with_concurrency(3).persist();

    let settings = BackupSettings::from_config(&config);
    assert_eq!(settings.concurrency, 3);
    assert_eq!(settings.work_dir, temp_dir.path().join("work"));
    assert!(!settings.work_dir.exists());

    fs::create_dir_all(&settings.work_dir).unwrap();
}
