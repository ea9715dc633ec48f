//! boardsync: keep a Notion board and a GitHub issue tracker in step.
//!
//! # Usage
//!
//! ```text
//! boardsync init --database-id <id> --owner <owner> --repo <repo> [--force]
//! boardsync sync [--dry-run] [--batch-width N] [--json] [--strict]
//! boardsync plan [--json]
//! boardsync prune --below N [--dry-run]
//! ```
//!
//! Tokens come from `NOTION_KEY` / `GITHUB_KEY` (or the config file).

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{init::InitArgs, plan::PlanArgs, prune::PruneArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "boardsync",
    version,
    about = "Reconcile a Notion board with a GitHub issue tracker",
    long_about = None,
)]
struct Cli {
    /// Config file to use instead of ~/.boardsync/config.yaml.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log at debug level (RUST_LOG still wins when set).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a skeleton config file.
    Init(InitArgs),

    /// Run one full reconciliation pass.
    Sync(SyncArgs),

    /// Show what a sync would do without writing anything.
    Plan(PlanArgs),

    /// Delete tracker records numbered below a threshold.
    Prune(PruneArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init(args) => args.run(config),
        Commands::Sync(args) => args.run(config),
        Commands::Plan(args) => args.run(config),
        Commands::Prune(args) => args.run(config),
    }
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
