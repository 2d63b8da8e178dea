//! Configuration module for db-backup-manager
//!
//! This module handles loading, validating, and resolving configuration from a
//! TOML file and the environment.
//!
//! ## Precedence
//!
//! Settings are applied in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. The TOML file (if given)
//! 3. Environment variables (`MEGA_EMAIL`, `MEGA_PASSWORD`, `WEBHOOK_URL`,
//!    `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD`)
//!
//! The resulting [`Config`] is built once at start-up and handed to the stages;
//! nothing else reads the environment.
//!
//! ## Example Usage
//!
//! ```no_run
//! use db_backup_manager::config;
//!
//! let config = config::load_config(Some(std::path::Path::new("backup-config.toml")))?;
//! println!("Work dir: {:?}", config.global.work_dir);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    apply_env_overrides, connection_url, load_config, load_config_with_env, parse_config,
    validate_config, validate_for_run, ConfigError, Result, ENV_DB_HOST, ENV_DB_PASSWORD,
    ENV_DB_PORT, ENV_DB_USER, ENV_MEGA_EMAIL, ENV_MEGA_PASSWORD, ENV_WEBHOOK_URL,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
