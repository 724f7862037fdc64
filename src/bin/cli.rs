//! Leaderboard sync CLI
//!
//! Local execution entry point. `serve` runs the background sync and answers
//! newline-delimited JSON tool calls on stdin; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use leaderboard_sync::{
    error::Result,
    models::Config,
    pipeline::SyncScheduler,
    services::{LeaderboardClient, LeaderboardService, LeaderboardSource, ToolCall, tools},
    storage::SnapshotStore,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};

/// Hackathon leaderboard cache and query tools
#[derive(Parser, Debug)]
#[command(
    name = "leaderboard",
    version,
    about = "Keeps a local snapshot of the hackathon leaderboard and answers queries over it"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background sync and answer JSON tool calls on stdin
    Serve,

    /// Run only the background sync loop
    Sync,

    /// Fetch the leaderboard once and replace the snapshot
    Refresh,

    /// Show the current snapshot status
    Status,

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env();

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    if let Command::Validate = cli.command {
        log::info!("✓ Config OK ({})", cli.config.display());
        log::info!("Endpoint: {}", config.source.endpoint);
        log::info!("Database: {}", config.store.path.display());
        log::info!("Sync interval: {}s", config.sync.interval_secs);
        return Ok(());
    }

    let store = Arc::new(SnapshotStore::open(&config.store.path)?);
    let source: Arc<dyn LeaderboardSource> = Arc::new(LeaderboardClient::new(&config.source)?);
    log::info!("Using database at {}", config.store.path.display());

    match cli.command {
        Command::Serve => {
            let scheduler = SyncScheduler::new(
                Arc::clone(&source),
                Arc::clone(&store),
                config.sync.interval(),
            );
            let service = Arc::new(LeaderboardService::new(
                store,
                source,
                config.query.clone(),
                config.sync.interval_secs,
            ));
            serve(scheduler, service).await?;

            // The blocking stdin reader would otherwise hold runtime shutdown.
            log::info!("Done!");
            std::process::exit(0);
        }

        Command::Sync => {
            let scheduler = SyncScheduler::new(source, store, config.sync.interval());
            log::info!(
                "Leaderboard sync started (every {}s)",
                scheduler.interval().as_secs()
            );
            scheduler.run_until(shutdown_signal()).await;
        }

        Command::Refresh => {
            let service = LeaderboardService::new(
                store,
                source,
                config.query.clone(),
                config.sync.interval_secs,
            );
            print_json(&tools::dispatch(&service, ToolCall::Refresh).await)?;
        }

        Command::Status => {
            let service = LeaderboardService::new(
                store,
                source,
                config.query.clone(),
                config.sync.interval_secs,
            );
            print_json(&tools::dispatch(&service, ToolCall::DatabaseStatus).await)?;
        }

        Command::Validate => {}
    }

    log::info!("Done!");

    Ok(())
}

/// Run the scheduler in the background and answer tool calls until stdin
/// closes or Ctrl-C arrives.
async fn serve(scheduler: SyncScheduler, service: Arc<LeaderboardService>) -> Result<()> {
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let sync_task = tokio::spawn(async move {
        scheduler
            .run_until(async {
                let _ = stop_rx.await;
            })
            .await;
    });

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Value>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = out_rx.recv().await {
            let mut line = response.to_string();
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<(), std::io::Error>(())
    });

    log::info!("Ready for tool calls on stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    log::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let service = Arc::clone(&service);
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let response = tools::handle_line(&service, &line).await;
                    let _ = out_tx.send(response);
                });
            }
            _ = &mut shutdown => break,
        }
    }

    let _ = stop_tx.send(());
    if let Err(e) = sync_task.await {
        log::error!("Sync task ended abnormally: {}", e);
    }

    // In-flight calls hold their own sender; the writer drains them before exiting.
    drop(out_tx);
    match writer.await {
        Ok(result) => result?,
        Err(e) => log::error!("Output task ended abnormally: {}", e),
    }

    Ok(())
}

/// Resolve on Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl-C: {}", e);
        futures::future::pending::<()>().await;
    }
    log::info!("Shutdown requested");
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
