// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Local AI platform launcher
//!
//! The `localai` binary is the host-side orchestrator for the self-hosted
//! Local AI platform. Each invocation is a one-shot reconciliation:
//!
//! - `localai launch --profile <p>` normalizes `.env`, provisions the
//!   wildcard certificate, pins the Supabase checkout, propagates config
//!   into it, patches the hosts file, and brings the infrastructure and AI
//!   compose stacks up in order under one project identity.
//! - `localai plan-remote-access` renders the hosts/DNS material other
//!   machines need to reach the platform over the LAN.
//!
//! Exit codes follow `localai_core::error::exit`; usage errors exit 2.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

mod commands;

/// Local AI platform orchestrator
#[derive(Parser)]
#[command(name = "localai")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOCALAI_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile prerequisites and bring both stacks up
    #[command(name = "launch")]
    Launch(commands::launch::LaunchArgs),

    /// Render hosts/DNS material for reaching the platform from other hosts
    #[command(name = "plan-remote-access")]
    PlanRemoteAccess(commands::remote::PlanArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(localai_core::error::exit::USAGE);
    }

    let result = match cli.command {
        Commands::Launch(args) => commands::launch::run(args).await,
        Commands::PlanRemoteAccess(args) => commands::remote::run(args).await,
    };

    if let Err(err) = result {
        report(&err);
        std::process::exit(err.exit_code());
    }
}

/// Print the failure and its cause chain to stderr.
fn report(err: &localai_core::Error) {
    eprintln!("{} {err}", "error:".red().bold());
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
