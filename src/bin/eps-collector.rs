//! eps-collector CLI - assemble EPS board telemetry into snapshot records
//!
//! `run` reads the live board, `replay` feeds a captured log through the same
//! assembler, `check-config` prints the effective configuration.

use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

use eps_collector::control::{self, ControlState};
use eps_collector::runtime::{CollectorConfig, PolicyKind, SnapshotAssembler};
use eps_collector::{Collector, CollectorError, LineSource, RecentReadings, SinkSet, Transport};

const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Parser)]
#[command(name = "eps-collector")]
#[command(version, about = "Assemble EPS board telemetry into snapshot records", long_about = None)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the board, store snapshots, serve the control surface
    Run {
        /// Path to collector configuration (default: eps-collector.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the completion policy
        #[arg(short, long, value_enum)]
        policy: Option<PolicyKind>,
    },

    /// Feed a captured telemetry log through the assembler into the configured sinks
    Replay {
        /// Captured telemetry text
        #[arg(short, long)]
        input: PathBuf,

        /// Path to collector configuration (default: eps-collector.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the completion policy
        #[arg(short, long, value_enum)]
        policy: Option<PolicyKind>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig {
        /// Path to collector configuration (default: eps-collector.yaml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // A device read parked on the blocking pool would hold the runtime open
    let _ = std::io::stdout().flush();
    process::exit(0);
}

async fn dispatch(cli: Cli) -> Result<(), CollectorError> {
    match cli.command {
        Commands::Run { config, policy } => {
            let config = load_config(config.as_deref(), policy)?;
            init_tracing(cli.debug, config.log_level.as_deref());
            run(config).await
        }
        Commands::Replay { input, config, policy } => {
            let config = load_config(config.as_deref(), policy)?;
            init_tracing(cli.debug, config.log_level.as_deref());
            replay(config, &input).await
        }
        Commands::CheckConfig { config } => {
            let config = load_config(config.as_deref(), None)?;
            print!("{}", config.to_yaml()?);
            Ok(())
        }
    }
}

fn load_config(
    path: Option<&Path>,
    policy: Option<PolicyKind>,
) -> Result<CollectorConfig, CollectorError> {
    let mut config = CollectorConfig::resolve(path)?;
    if let Some(policy) = policy {
        config.completion.policy = policy;
        config.validate()?;
    }
    Ok(config)
}

/// Priority: RUST_LOG > --debug > log_level from config > info.
fn init_tracing(debug: bool, config_level: Option<&str>) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new(config_level.unwrap_or(DEFAULT_LOG_LEVEL))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn run(config: CollectorConfig) -> Result<(), CollectorError> {
    // The loop never starts without a live transport
    let Transport { lines, commands } = Transport::open(&config.transport).await?;

    let readings = RecentReadings::new(config.sinks.recent_capacity);
    let sinks = SinkSet::from_config(&config.sinks, readings.clone()).await?;
    tracing::info!("Sinks ready: {:?}", sinks.names());

    let (stop_server, server_stopped) = tokio::sync::oneshot::channel::<()>();
    let server = if config.control.enabled {
        let listener = control::bind(config.control.bind).await?;
        let state = ControlState {
            commands,
            readings,
            sinks: sinks.clone(),
        };
        Some(tokio::spawn(control::serve(listener, state, async {
            let _ = server_stopped.await;
        })))
    } else {
        tracing::info!("Control surface disabled");
        None
    };

    let assembler = SnapshotAssembler::with_policy(
        config.completion.policy,
        config.interval(),
        Instant::now(),
    );
    let mut collector = Collector::new(lines, assembler, sinks);

    let result = collector
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown requested");
        })
        .await;

    let _ = stop_server.send(());
    collector.flush().await;

    if let Some(server) = server {
        match server.await {
            Ok(Err(e)) => tracing::error!("Control surface failed: {}", e),
            Err(e) => tracing::error!("Control surface task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    result?;
    Ok(())
}

async fn replay(config: CollectorConfig, input: &Path) -> Result<(), CollectorError> {
    let file = tokio::fs::File::open(input).await?;

    let readings = RecentReadings::new(config.sinks.recent_capacity);
    let sinks = SinkSet::from_config(&config.sinks, readings).await?;

    let assembler = SnapshotAssembler::with_policy(
        config.completion.policy,
        config.interval(),
        Instant::now(),
    );
    let mut collector = Collector::new(
        LineSource::new(file, config.read_timeout()),
        assembler,
        sinks,
    );

    let summary = collector.run().await?;
    collector.flush().await;

    println!(
        "Replayed {} lines from {}: {} snapshots emitted, {} unrecognized, {} undecodable",
        summary.stats.lines_seen,
        input.display(),
        summary.stats.emitted,
        summary.stats.lines_unrecognized,
        summary.dropped_lines,
    );
    Ok(())
}
