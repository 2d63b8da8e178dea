//! Live target list from the server's `pg_database` catalog

use super::TargetSource;
use crate::config::{connection_url, DatabaseConfig};
use crate::model::DatabaseTarget;
use crate::utils::CommandExecutor;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Databases that accept connections and are not templates
pub const CATALOG_QUERY: &str =
    "SELECT datname FROM pg_database WHERE datistemplate = false AND datallowconn ORDER BY datname";

const CATALOG_TIMEOUT: Duration = Duration::from_secs(60);

pub struct CatalogSource {
    executor: Arc<dyn CommandExecutor>,
    database: DatabaseConfig,
}

impl CatalogSource {
    pub fn new(executor: Arc<dyn CommandExecutor>, database: DatabaseConfig) -> Self {
        Self { executor, database }
    }
}

impl TargetSource for CatalogSource {
    fn load_targets(&self) -> Result<Vec<DatabaseTarget>> {
        let maintenance = connection_url(&self.database, &self.database.maintenance_db)?;
        let dbname_arg = format!("--dbname={}", maintenance);
        let args = ["-At", "--no-password", "-c", CATALOG_QUERY, dbname_arg.as_str()];

        let output = self
            .executor
            .run_command(&self.database.psql_command, &args, None, Some(CATALOG_TIMEOUT))
            .context("Failed to query database catalog")?;

        if !output.success() {
            bail!(
                "Catalog query exited with code {:?}: {}",
                output.exit_code,
                output.stderr_tail()
            );
        }

        let mut targets = Vec::new();
        for name in output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            debug!("Catalog lists database '{}'", name);
            targets.push(DatabaseTarget::new(name, connection_url(&self.database, name)?));
        }

        Ok(targets)
    }

    fn describe(&self) -> String {
        format!("catalog of {}:{}", self.database.host, self.database.port)
    }
}
