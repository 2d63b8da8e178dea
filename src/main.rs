use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use db_backup_manager::config::{self, connection_url, Config, ConfigError, TargetSourceKind};
use db_backup_manager::managers::logging;
use db_backup_manager::stages::{GzipCompressStage, PgDumpStage, RemoteUploadStage};
use db_backup_manager::storage::{MegaCmdStorage, StorageCredentials};
use db_backup_manager::targets::{self, StaticSource, TargetSource};
use db_backup_manager::utils::{CommandExecutor, RealExecutor};
use db_backup_manager::{BackupManager, BackupSettings, CancelFlag, DatabaseTarget, NotificationManager, RunSummary};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use tracing::{error, warn};

/// Exit status when every target reached DONE
const EXIT_OK: u8 = 0;
/// Exit status when at least one target failed or was cancelled
const EXIT_TARGET_FAILED: u8 = 1;
/// Exit status for configuration and set-up errors
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser)]
#[command(name = "db-backup-manager")]
#[command(about = "Dump, compress and upload PostgreSQL databases to MEGA", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults and environment only when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up all configured databases, or only the given ones
    Run {
        /// Database to back up (can be used multiple times)
        #[arg(short, long = "target")]
        targets: Vec<String>,

        /// Number of databases processed in parallel
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: Option<u16>,
    },

    /// List the databases the configured source yields
    List,

    /// Validate configuration, credentials and required tools
    Validate,
}

fn main() -> ExitCode {
    // A missing .env file is normal
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match run_cli(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_CONFIG_ERROR)
        }
    }
}

fn run_cli(cli: Cli) -> Result<u8> {
    let config = match config::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console_logging();
            return Err(e).context("Failed to load configuration");
        }
    };

    // Setup logging with file rotation (must keep guard alive)
    let logging_config = logging::LoggingConfig::from_config(&config.global);
    let _log_guard = logging::init_logging(&logging_config)?;

    let executor: Arc<dyn CommandExecutor> = Arc::new(RealExecutor::new());

    match cli.command {
        Commands::Run { targets, concurrency } => handle_run(config, executor, targets, concurrency),
        Commands::List => handle_list(&config, executor),
        Commands::Validate => Ok(handle_validate(&config, executor)),
    }
}

fn handle_run(
    mut config: Config,
    executor: Arc<dyn CommandExecutor>,
    requested: Vec<String>,
    concurrency: Option<u16>,
) -> Result<u8> {
    config::validate_for_run(&config)?;

    if let Some(concurrency) = concurrency {
        config.global.concurrency = usize::from(concurrency);
    }

    let source: Box<dyn TargetSource> = if requested.is_empty() {
        targets::source_from_config(&config, executor.clone())
    } else {
        let explicit = requested
            .iter()
            .map(|id| Ok(DatabaseTarget::new(id.as_str(), connection_url(&config.database, id)?)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Box::new(StaticSource::new(explicit))
    };

    let storage = MegaCmdStorage::new(
        executor.clone(),
        config.storage.remote_folder.clone(),
        config.storage.upload_timeout(),
    );
    let upload = Arc::new(RemoteUploadStage::new(
        storage,
        StorageCredentials::new(&config.storage.email, &config.storage.password),
    ));

    let manager = BackupManager::new(
        BackupSettings::from_config(&config),
        Arc::new(PgDumpStage::new(
            executor,
            config.database.dump_command.clone(),
            config.database.dump_format,
            config.database.dump_timeout(),
        )),
        Arc::new(GzipCompressStage::new(
            config.compression.level,
            config.compression.buffer_size_kb * 1024,
        )),
        upload.clone(),
    )
    .with_notifier(Arc::new(NotificationManager::new(config.notifications.clone())));

    install_ctrl_c_handler(manager.cancel_flag());

    println!("Running database backups...");
    let summary = manager.run_from_source(source.as_ref());
    upload.close();
    let summary = summary?;

    print_summary(&summary);

    if summary.all_succeeded() {
        println!("✓ All backups completed successfully");
        Ok(EXIT_OK)
    } else {
        println!(
            "✗ {} of {} backup(s) did not complete",
            summary.failed_count(),
            summary.len()
        );
        Ok(EXIT_TARGET_FAILED)
    }
}

fn handle_list(config: &Config, executor: Arc<dyn CommandExecutor>) -> Result<u8> {
    let source = targets::source_from_config(config, executor);
    let targets = source
        .load_targets()
        .with_context(|| format!("Failed to load targets from {}", source.describe()))?;

    println!("Databases from {}:", source.describe());
    if targets.is_empty() {
        println!("  (none)");
    }
    for target in &targets {
        println!("  {}", target.id);
    }

    Ok(EXIT_OK)
}

fn handle_validate(config: &Config, executor: Arc<dyn CommandExecutor>) -> u8 {
    let mut problems = Vec::new();

    match config::validate_for_run(config) {
        Ok(()) => println!("✓ Storage credentials present"),
        Err(e) => problems.push(e.to_string()),
    }

    let mut tools = vec![config.database.dump_command.as_str(), "mega-put"];
    if config.targets.source == TargetSourceKind::Catalog {
        tools.push(config.database.psql_command.as_str());
    }
    for tool in tools {
        match which::which(tool) {
            Ok(path) => println!("✓ {} found at {}", tool, path.display()),
            Err(_) => problems.push(format!("{} not found in PATH", tool)),
        }
    }

    let source = targets::source_from_config(config, executor);
    match source.load_targets() {
        Ok(targets) => println!("✓ {} database(s) from {}", targets.len(), source.describe()),
        Err(e) => problems.push(format!("Failed to load targets: {:#}", e)),
    }

    if problems.is_empty() {
        println!("Configuration is valid!");
        EXIT_OK
    } else {
        for problem in &problems {
            eprintln!("✗ {}", problem);
        }
        EXIT_CONFIG_ERROR
    }
}

/// Stop starting new targets once Ctrl-C is received
fn install_ctrl_c_handler(flag: CancelFlag) {
    let spawned = thread::Builder::new()
        .name("signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Ctrl-C handling unavailable: {}", e);
                    return;
                }
            };

            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, finishing running targets and skipping the rest");
                    flag.cancel();
                }
            });
        });

    if let Err(e) = spawned {
        warn!("Failed to start signal handler thread: {}", e);
    }
}

fn print_summary(summary: &RunSummary) {
    if summary.is_empty() {
        println!("No databases to back up.");
        return;
    }

    println!();
    println!("{:<28} {:<18} {:>9}  Detail", "Database", "State", "Duration");
    for outcome in &summary.outcomes {
        let detail = match (&outcome.remote_reference, &outcome.error) {
            (Some(reference), _) => reference.clone(),
            (None, Some(error)) => error.clone(),
            (None, None) => String::new(),
        };
        println!(
            "{:<28} {:<18} {:>8.1}s  {}",
            outcome.target.id,
            outcome.final_state.to_string(),
            outcome.duration.as_secs_f64(),
            detail
        );
        if let Some(path) = outcome.preserved_path() {
            println!("{:<28} kept {}", "", path.display());
        }
    }
    println!();
}
