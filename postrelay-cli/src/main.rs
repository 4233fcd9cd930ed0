// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! PostRelay CLI - capture relay agent and tooling.
//!
//! # Examples
//!
//! ```bash
//! # Run the agent (NDJSON commands on stdin, replies on stdout)
//! postrelay run
//!
//! # Run with an explicit companion host binary
//! postrelay run --host-program /opt/postrelay/postrelay-host
//!
//! # Normalize a captured payload offline
//! postrelay extract HomeTimeline capture.json --pretty
//!
//! # Check whether the sink daemon is reachable
//! postrelay probe --port 17381
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use postrelay_agent::{BufferLayer, DiagnosticBuffer};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{extract, probe, run};

// ============================================================================
// CLI Definition
// ============================================================================

/// PostRelay CLI - capture relay agent and tooling.
#[derive(Parser)]
#[command(name = "postrelay")]
#[command(about = "Captures posts from intercepted timeline traffic and relays them to a local sink")]
#[command(version)]
#[command(author = "PostRelay Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'run' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the capture agent over an NDJSON stdin/stdout control surface.
    #[command(visible_alias = "r")]
    Run(run::RunArgs),

    /// Normalize a captured payload file offline.
    #[command(visible_alias = "x")]
    Extract(extract::ExtractArgs),

    /// Check whether the sink daemon is reachable.
    Probe(probe::ProbeArgs),
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool, diagnostics: DiagnosticBuffer) {
    let filter = if quiet {
        EnvFilter::new("postrelay=error")
    } else if verbose {
        EnvFilter::new("postrelay=debug,info")
    } else {
        EnvFilter::new("postrelay=info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(BufferLayer::new(diagnostics))
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let diagnostics = DiagnosticBuffer::new();
    setup_logging(cli.verbose, cli.quiet, diagnostics.clone());

    let result = match &cli.command {
        Some(Commands::Run(args)) => run::run(args, diagnostics).await,
        Some(Commands::Extract(args)) => extract::run(args),
        Some(Commands::Probe(args)) => probe::run(args).await,
        None => run::run(&run::RunArgs::default(), diagnostics).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }

    Ok(())
}
