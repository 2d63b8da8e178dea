//! `db.json` target list

use super::TargetSource;
use crate::config::{connection_url, DatabaseConfig};
use crate::model::DatabaseTarget;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

/// One entry of the file: a bare database name or an explicit target
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TargetEntry {
    Name(String),
    Explicit {
        id: String,
        #[serde(default)]
        connection: Option<String>,
    },
}

/// Reads a JSON array of targets
///
/// ```json
/// ["sales", {"id": "crm", "connection": "postgresql://crm-host/crm"}]
/// ```
///
/// Bare names (and objects without `connection`) get a URL built from the
/// database settings.
pub struct JsonFileSource {
    path: PathBuf,
    database: DatabaseConfig,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>, database: DatabaseConfig) -> Self {
        Self {
            path: path.into(),
            database,
        }
    }

    /// Parse file contents into targets
    pub fn parse(&self, contents: &str) -> Result<Vec<DatabaseTarget>> {
        let entries: Vec<TargetEntry> = serde_json::from_str(contents)
            .with_context(|| format!("Invalid target list in {:?}", self.path))?;

        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(entries.len());

        for entry in entries {
            let (id, connection) = match entry {
                TargetEntry::Name(name) => (name, None),
                TargetEntry::Explicit { id, connection } => (id, connection),
            };

            let id = id.trim().to_string();
            if id.is_empty() {
                bail!("Empty database name in {:?}", self.path);
            }

            let connection = match connection {
                Some(connection) => connection,
                None => connection_url(&self.database, &id)?,
            };

            let target = DatabaseTarget::new(id, connection);
            // Two ids sanitizing to the same stem would share artifact files
            if !seen.insert(target.file_stem()) {
                bail!(
                    "Duplicate database target '{}' in {:?}",
                    target.id,
                    self.path
                );
            }
            targets.push(target);
        }

        Ok(targets)
    }
}

impl TargetSource for JsonFileSource {
    fn load_targets(&self) -> Result<Vec<DatabaseTarget>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read target list: {:?}", self.path))?;
        self.parse(&contents)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
