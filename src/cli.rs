//! Command line interface built on clap.
//!
//! [`Cli`] carries the global `--config` and `--verbose` flags and an optional
//! [`Command`]; with no subcommand the harvester runs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// Keeps node rewards flowing for every configured account.
#[derive(Debug, Parser)]
#[command(name = "harvester", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the TOML config file.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run rounds until interrupted.
    Run {
        /// Run a single round and exit.
        #[arg(long)]
        once: bool,
    },

    /// Show each account's token expiry and node count without contacting the API.
    Status,
}

impl Cli {
    /// The subcommand, defaulting to a continuous run.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run { once: false })
    }
}
