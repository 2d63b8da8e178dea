//! Database target sources
//!
//! Targets come either from a static JSON file or from the server's catalog.
//! Exclusion patterns are applied here, before the orchestrator sees anything.

mod catalog;
mod json_file;

pub use catalog::{CatalogSource, CATALOG_QUERY};
pub use json_file::JsonFileSource;

use crate::config::{Config, TargetSourceKind};
use crate::model::DatabaseTarget;
use crate::utils::CommandExecutor;
use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

/// Where the list of databases to back up comes from
pub trait TargetSource: Send + Sync {
    fn load_targets(&self) -> Result<Vec<DatabaseTarget>>;

    /// Short human-readable description for logs
    fn describe(&self) -> String;
}

/// Drop targets whose id contains any pattern (case-insensitive)
pub fn filter_excluded(targets: Vec<DatabaseTarget>, patterns: &[String]) -> Vec<DatabaseTarget> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    targets
        .into_iter()
        .filter(|target| {
            let id = target.id.to_lowercase();
            match patterns.iter().find(|p| id.contains(p.as_str())) {
                Some(pattern) => {
                    debug!("Excluding '{}' (matches '{}')", target.id, pattern);
                    false
                }
                None => true,
            }
        })
        .collect()
}

/// Source wrapper applying the configured exclusion patterns
pub struct ExcludingSource {
    inner: Box<dyn TargetSource>,
    patterns: Vec<String>,
}

impl ExcludingSource {
    pub fn new(inner: Box<dyn TargetSource>, patterns: Vec<String>) -> Self {
        Self { inner, patterns }
    }
}

impl TargetSource for ExcludingSource {
    fn load_targets(&self) -> Result<Vec<DatabaseTarget>> {
        let targets = self.inner.load_targets()?;
        Ok(filter_excluded(targets, &self.patterns))
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// Build the configured target source, exclusions included
pub fn source_from_config(config: &Config, executor: Arc<dyn CommandExecutor>) -> Box<dyn TargetSource> {
    let inner: Box<dyn TargetSource> = match config.targets.source {
        TargetSourceKind::File => Box::new(JsonFileSource::new(
            config.targets.file.clone(),
            config.database.clone(),
        )),
        TargetSourceKind::Catalog => Box::new(CatalogSource::new(executor, config.database.clone())),
    };

    Box::new(ExcludingSource::new(inner, config.global.exclude_patterns.clone()))
}

/// Fixed list of targets, mostly useful for the `--target` CLI override and tests
pub struct StaticSource {
    targets: Vec<DatabaseTarget>,
}

impl StaticSource {
    pub fn new(targets: Vec<DatabaseTarget>) -> Self {
        Self { targets }
    }
}

impl TargetSource for StaticSource {
    fn load_targets(&self) -> Result<Vec<DatabaseTarget>> {
        Ok(self.targets.clone())
    }

    fn describe(&self) -> String {
        format!("{} explicit target(s)", self.targets.len())
    }
}
