//! Pulsebar Daemon
//!
//! Samples system metrics in the background and logs every reading.
//! SIGUSR1 toggles the popup, SIGINT/SIGTERM shut down.

mod config;
mod sensors;
mod state;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use pulsebar_engine::TokioScheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use state::AppState;
use store::FileStore;

#[derive(Parser)]
#[command(name = "pulsebard")]
#[command(about = "Background system metrics sampler")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    // Load configuration
    let config = if cli.config.exists() {
        let config = Config::load(&cli.config).context("Failed to load configuration")?;
        info!("Loaded configuration from: {}", cli.config.display());
        config
    } else {
        warn!(
            "No configuration at {}, using defaults",
            cli.config.display()
        );
        Config::default()
    };

    let store = Arc::new(FileStore::load(&config.store)?);
    info!("Preference store: {}", store.path().display());
    let scheduler = Arc::new(TokioScheduler::current()?);

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let consumer = tokio::spawn(state::consume_events(event_rx));

    let state = AppState::new(config, store, scheduler, event_tx)?;
    state.enable_saved();

    // Setup Unix signal handlers
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigusr1 = signal(SignalKind::user_defined1())?;

    loop {
        tokio::select! {
            _ = sigusr1.recv() => {
                state.toggle_visible();
                state.log_status();
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down");
                break;
            }
        }
    }

    state.shutdown();
    // Readers hold the remaining event senders
    drop(state);
    match tokio::time::timeout(Duration::from_secs(2), consumer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Event consumer failed: {}", e),
        Err(_) => warn!("Event consumer did not drain in time"),
    }

    Ok(())
}
