// src/cli.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "key-registry",
    version,
    about = "Per-tenant API key health and rate-limit registry",
    long_about = "Keeps a registry of API keys per tenant with sliding-window success and failure statistics, rate-limit and circuit-breaker state, and applies every change set atomically against Redis or process memory."
)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "KEY_REGISTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Human-readable logs instead of JSON
    #[arg(long, env = "KEY_REGISTRY_PLAIN_LOGS")]
    pub plain_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Print one registry snapshot as JSON
    Read {
        /// Registry id
        registry_id: String,
    },

    /// Delete every registry whose id starts with PREFIX
    Purge {
        prefix: String,

        /// Keys examined per scan step; defaults to `purge.batch_size`
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

impl Cli {
    pub fn effective_command(&self) -> &Commands {
        self.command.as_ref().unwrap_or(&Commands::Serve)
    }
}
