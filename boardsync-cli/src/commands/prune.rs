//! `boardsync prune --below N [--dry-run]`

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use boardsync_sync::prune_below;

use super::{connect, load_config, runtime};

/// Delete tracker records numbered below a threshold.
#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Records with a number strictly below this are deleted.
    #[arg(long, value_name = "N")]
    pub below: u64,

    /// List what would be deleted without deleting.
    #[arg(long)]
    pub dry_run: bool,
}

impl PruneArgs {
    pub fn run(self, explicit: Option<&Path>) -> Result<()> {
        let config = load_config(explicit)?;
        let (_, tracker) = connect(&config);

        let report = runtime()?
            .block_on(prune_below(&tracker, self.below, self.dry_run))
            .context("prune failed")?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        if report.candidates.is_empty() {
            println!("{prefix}No records below #{}.", self.below);
            return Ok(());
        }
        for number in &report.candidates {
            let mark = if self.dry_run { "~" } else { "✗" };
            println!("  {mark}  {number}");
        }
        if self.dry_run {
            println!(
                "{prefix}{} records would be deleted",
                report.candidates.len()
            );
            return Ok(());
        }

        println!(
            "{} deleted {} of {} records",
            "✓".green().bold(),
            report.deleted,
            report.candidates.len()
        );
        for failure in &report.failures {
            println!("  {} {}: {}", "✗".red().bold(), failure.key, failure.error);
        }
        if !report.failures.is_empty() {
            bail!("{} delete(s) failed", report.failures.len());
        }
        Ok(())
    }
}
