//! WolfSync - Content-Convergent Directory Synchronization
//!
//! Command-line entry point: builds the configuration, sizes the runtime
//! and runs the sync engine.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfsync::config::{LoggingConfig, WolfSyncConfig};
use wolfsync::tuning;
use wolfsync::SyncCoordinator;

const DEFAULT_CONFIG: &str = "wolfsync.toml";

/// WolfSync - keep local directories in sync
#[derive(Parser)]
#[command(name = "wolfsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (optional; defaults apply if absent)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start syncing directories
    Start {
        /// Directories to sync
        #[arg(short = 's', long = "sync-dirs", num_args = 1..)]
        sync_dirs: Vec<PathBuf>,

        /// Max number of worker threads; must be > 0
        #[arg(
            short = 't',
            long = "thread-max",
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        thread_max: Option<usize>,

        /// Stay attached and stop cleanly on Ctrl-C
        #[arg(long)]
        foreground: bool,

        /// Poll interval in milliseconds
        #[arg(long)]
        poll_interval_ms: Option<u64>,
    },

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },

    /// Validate configuration file and sync topology
    Validate,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // Initialize logging
    init_logging(&config.logging);

    match cli.command {
        Commands::Start {
            sync_dirs,
            thread_max,
            foreground,
            poll_interval_ms,
        } => {
            if !sync_dirs.is_empty() {
                config.sync.directories = sync_dirs;
            }
            if let Some(limit) = thread_max {
                config.sync.worker_limit = limit;
            }
            if let Some(interval) = poll_interval_ms {
                config.sync.poll_interval_ms = interval;
            }
            if foreground {
                config.sync.daemon = false;
            }
            if config.sync.directories.is_empty() {
                eprintln!("No directories to sync: pass --sync-dirs or set sync.directories\n");
                eprintln!("{}", start_usage());
                std::process::exit(1);
            }
            run_start(config)
        }
        Commands::Init { output } => run_init(&output),
        Commands::Validate => run_validate(config),
    }
}

/// Help text for the `start` subcommand
fn start_usage() -> String {
    let mut command = Cli::command();
    match command.find_subcommand_mut("start") {
        Some(start) => start.render_help().to_string(),
        None => command.render_help().to_string(),
    }
}

/// Load the configuration file, falling back to defaults when the
/// default path does not exist
fn load_config(path: Option<&Path>) -> anyhow::Result<WolfSyncConfig> {
    match path {
        Some(path) => WolfSyncConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            WolfSyncConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG))
        }
        None => Ok(WolfSyncConfig::default()),
    }
}

/// Initialize logging
fn init_logging(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the sync engine
fn run_start(config: WolfSyncConfig) -> anyhow::Result<()> {
    tracing::info!("Starting WolfSync...");

    let coordinator = match SyncCoordinator::new(config.clone()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Refusing to start: {}", e);
            return Err(e.into());
        }
    };

    let tuned = tuning::auto_tune(config.sync.worker_limit);
    tracing::info!(
        worker_threads = tuned.worker_threads,
        max_blocking_threads = tuned.max_blocking_threads,
        "Runtime sized for {} cores",
        tuned.detected_cores
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(tuned.worker_threads)
        .max_blocking_threads(tuned.max_blocking_threads)
        .thread_name("wolfsync-worker")
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    let daemon = config.sync.daemon;
    runtime.block_on(async move {
        if daemon {
            tracing::info!("Running in daemon mode; terminate the process to stop");
            coordinator.run(std::future::pending::<()>()).await
        } else {
            tracing::info!("Running in foreground; press Ctrl-C to stop");
            coordinator
                .run(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                })
                .await
        }
    })?;

    tracing::info!("WolfSync shutdown complete");
    Ok(())
}

/// Write a starter configuration file
fn run_init(output: &Path) -> anyhow::Result<()> {
    if output.exists() {
        bail!("{} already exists; refusing to overwrite", output.display());
    }

    let config = WolfSyncConfig::with_directories(["/srv/sync/a", "/srv/sync/b"]);
    let rendered = config.to_toml()?;
    std::fs::write(output, rendered)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Configuration written to {}", output.display());
    println!("Edit sync.directories, then run: wolfsync --config {} start", output.display());
    Ok(())
}

/// Validate the configuration, including the sync topology
fn run_validate(config: WolfSyncConfig) -> anyhow::Result<()> {
    let coordinator = SyncCoordinator::new(config.clone()).context("Configuration is invalid")?;

    println!("Configuration is valid");
    println!("  Poll interval: {:?}", config.poll_interval());
    println!("  Worker limit: {}", config.sync.worker_limit);
    println!("  Mode: {}", if config.sync.daemon { "daemon" } else { "foreground" });
    for peer in coordinator.peers() {
        println!("  {}: {}", peer.id(), peer.root().display());
    }
    println!("{}", tuning::tuning_summary(&tuning::auto_tune(config.sync.worker_limit)));
    Ok(())
}
