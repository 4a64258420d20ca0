mod api;
mod cli;
mod config;
mod error;
mod node;
mod orchestrator;
mod sequencer;
mod state_machine;
mod token;
mod ui;
mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::Gateway;
use cli::{Cli, Command};
use config::{AppConfig, TomlConfigStore};
use orchestrator::{RoundOrchestrator, SharedState};
use sequencer::{LogSequencer, TracingSink};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(&cli.config)?;

    match cli.resolved_command() {
        Command::Status => {
            ui::print_status(&config.accounts);
            Ok(())
        }
        Command::Run { once } => run(&cli, config, once).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: &Cli, config: AppConfig, once: bool) -> Result<()> {
    // Fail at startup rather than inside a worker if the OS RNG is unusable.
    node::generate_node_id().context("OS random number generator unavailable")?;

    let (log, sequencer) = LogSequencer::spawn(TracingSink);
    let gateway = Gateway::new(&config.global, Some(log.clone())).context("failed to set up API gateway")?;

    info!(
        accounts = config.accounts.len(),
        base_url = %config.global.base_url,
        proxy = config.global.proxy().unwrap_or("none"),
        "harvester starting"
    );

    let orchestrator = RoundOrchestrator::new(
        Arc::new(gateway),
        Arc::new(SharedState::new(config.accounts)),
        TomlConfigStore::new(&cli.config),
        log,
        config.global.interval(),
    );

    if once {
        orchestrator.run_once().await;
    } else {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("interrupt received, finishing the current round");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => warn!("cannot listen for interrupt: {e}"),
            }
        });
        orchestrator.run(shutdown_rx).await;
    }

    drop(orchestrator);
    sequencer.drain().await;
    Ok(())
}
