// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tollgate - security gateway for multi-channel messaging agents.
//!
//! Binary entry point: config loading, tracing setup, and the CLI
//! surface over the gateway components.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod audit;
mod rate;
mod serve;

use tollgate_config::TollgateConfig;
use tollgate_core::TollgateError;

/// Tollgate - security gateway for multi-channel messaging agents.
#[derive(Parser, Debug)]
#[command(name = "tollgate", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file (overrides the XDG lookup).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway.
    Serve,
    /// Inspect or maintain the audit ledger.
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommand,
    },
    /// Inspect or reset rate-limit buckets.
    Rate {
        #[command(subcommand)]
        command: rate::RateCommand,
    },
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tollgate={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<TollgateConfig, figment::Error> {
    match path {
        Some(path) => tollgate_config::load_config_from_path(path),
        None => tollgate_config::load_config(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tollgate: invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.gateway.log_level);

    let result: Result<(), TollgateError> = match cli.command {
        Commands::Serve => serve::run(config).await,
        Commands::Audit { command } => audit::run(config, command).await,
        Commands::Rate { command } => rate::run(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tollgate: {e}");
            ExitCode::FAILURE
        }
    }
}
