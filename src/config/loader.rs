use super::types::*;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variables read once at start-up
pub const ENV_MEGA_EMAIL: &str = "MEGA_EMAIL";
pub const ENV_MEGA_PASSWORD: &str = "MEGA_PASSWORD";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_PORT: &str = "DB_PORT";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("Failed to load database targets: {0}")]
    TargetSource(String),

    #[error("Work directory {path:?} is not usable: {reason}")]
    WorkDir { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration from an optional TOML file plus the process environment
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using `lookup` for environment values
pub fn load_config_with_env<F>(path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => Config::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse TOML configuration without validation
pub fn parse_config(contents: &str) -> Result<Config> {
    Ok(toml::from_str(contents)?)
}

/// Override file settings with non-empty environment values
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(email) = get(ENV_MEGA_EMAIL) {
        config.storage.email = email;
    }
    if let Some(password) = get(ENV_MEGA_PASSWORD) {
        config.storage.password = password;
    }
    if let Some(url) = get(ENV_WEBHOOK_URL) {
        config.notifications.webhook_url = url;
    }
    if let Some(host) = get(ENV_DB_HOST) {
        config.database.host = host;
    }
    if let Some(port) = get(ENV_DB_PORT) {
        config.database.port = port.trim().parse().map_err(|_| {
            ConfigError::ValidationError(format!("{} is not a valid port: {}", ENV_DB_PORT, port))
        })?;
    }
    if let Some(user) = get(ENV_DB_USER) {
        config.database.user = user;
    }
    if let Some(password) = get(ENV_DB_PASSWORD) {
        config.database.password = password;
    }

    Ok(())
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.global.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "global.concurrency must be at least 1".to_string(),
        ));
    }

    if config.global.work_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "global.work_dir must not be empty".to_string(),
        ));
    }

    if config.database.host.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.host must not be empty".to_string(),
        ));
    }

    if config.database.dump_command.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "database.dump_command must not be empty".to_string(),
        ));
    }

    if config.compression.level > 9 {
        return Err(ConfigError::ValidationError(format!(
            "compression.level must be between 0 and 9, got {}",
            config.compression.level
        )));
    }

    if config.compression.buffer_size_kb == 0 {
        return Err(ConfigError::ValidationError(
            "compression.buffer_size_kb must be at least 1".to_string(),
        ));
    }

    if !config.storage.remote_folder.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "storage.remote_folder must be an absolute remote path: {}",
            config.storage.remote_folder
        )));
    }

    let webhook = config.notifications.webhook_url.trim();
    if !webhook.is_empty() && Url::parse(webhook).is_err() {
        return Err(ConfigError::ValidationError(format!(
            "notifications.webhook_url is not a valid URL: {}",
            webhook
        )));
    }

    Ok(())
}

/// Checks that only matter when a backup is actually going to run
pub fn validate_for_run(config: &Config) -> Result<()> {
    if config.storage.email.trim().is_empty() {
        return Err(ConfigError::MissingCredential(ENV_MEGA_EMAIL));
    }
    if config.storage.password.is_empty() {
        return Err(ConfigError::MissingCredential(ENV_MEGA_PASSWORD));
    }
    Ok(())
}

/// Build a `postgresql://` connection URL for one database
pub fn connection_url(database: &DatabaseConfig, dbname: &str) -> Result<String> {
    let invalid = |what: &str| {
        ConfigError::ValidationError(format!(
            "Cannot build connection URL for '{}': invalid {}",
            dbname, what
        ))
    };

    let mut url = Url::parse(&format!("postgresql://{}", database.host.trim()))
        .map_err(|_| invalid("host"))?;
    url.set_port(Some(database.port)).map_err(|_| invalid("port"))?;

    if !database.user.is_empty() {
        url.set_username(&database.user).map_err(|_| invalid("user"))?;
    }
    if !database.password.is_empty() {
        url.set_password(Some(&database.password))
            .map_err(|_| invalid("password"))?;
    }

    url.path_segments_mut()
        .map_err(|_| invalid("database name"))?
        .push(dbname);

    Ok(url.to_string())
}
