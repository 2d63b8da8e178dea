//! Test fixtures and sample data
//!
//! Provides pre-built targets and configuration templates for testing.

use db_backup_manager::model::DatabaseTarget;

/// Ten mebibytes, the size used for "large dump" scenarios
pub const TEN_MB: usize = 10 * 1024 * 1024;

/// Targets with the given ids and local connection URLs
pub fn targets(ids: &[&str]) -> Vec<DatabaseTarget> {
    ids.iter()
        .map(|id| DatabaseTarget::new(*id, format!("postgresql://postgres@localhost:5432/{}", id)))
        .collect()
}

/// Ids of the targets in a summary-like slice, in order
pub fn ids_of(targets: &[DatabaseTarget]) -> Vec<&str> {
    targets.iter().map(|t| t.id.as_str()).collect()
}

/// A `db.json` mixing bare names and explicit entries
pub fn sample_db_json() -> &'static str {
    r#"[
    "sales",
    "crm",
    "sales_test",
    { "id": "legacy", "connection": "postgresql://archive@old-host:5433/legacy" }
]"#
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
work_dir = "{work_dir}"
log_directory = "{log_dir}"

[storage]
email = "backup@example.com"
password = "mega-secret"

[targets]
file = "{targets_file}"
"#
}

/// Fill the placeholders of [`minimal_config_toml`]
pub fn render_config_toml(work_dir: &str, log_dir: &str, targets_file: &str) -> String {
    minimal_config_toml()
        .replace("{work_dir}", &work_dir.replace('\\', "/"))
        .replace("{log_dir}", &log_dir.replace('\\', "/"))
        .replace("{targets_file}", &targets_file.replace('\\', "/"))
}

/// Complete config TOML exercising every section
pub fn full_config_toml() -> &'static str {
    r#"
[global]
work_dir = "/var/tmp/db-backup-manager"
log_directory = "/var/log/db-backup-manager"
log_level = "debug"
log_max_files = 3
concurrency = 4
exclude_patterns = ["test", "scratch"]

[database]
host = "db.internal"
port = 5433
user = "backup"
password = "db-secret"
maintenance_db = "template_admin"
dump_command = "/usr/lib/postgresql/16/bin/pg_dump"
dump_format = "plain"
dump_timeout_seconds = 600

[compression]
level = 9
buffer_size_kb = 128

[storage]
email = "ops@example.com"
password = "mega-secret"
remote_folder = "/Backups/prod"
upload_timeout_seconds = 900

[notifications]
webhook_url = "https://discord.com/api/webhooks/123/abc"
project_name = "Prod DBs"
notify_on = ["failure"]

[targets]
source = "catalog"
"#
}
