//! `boardsync sync`: one full reconciliation pass.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use boardsync_sync::{pipeline, RunOptions, RunReport};

use super::{connect, load_config, runtime};

/// Arguments for `boardsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Compute the plan and stop before the first write.
    #[arg(long)]
    pub dry_run: bool,

    /// Concurrent board writes per group (overrides the config file).
    #[arg(long, value_name = "N")]
    pub batch_width: Option<usize>,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Exit non-zero when any item failed.
    #[arg(long)]
    pub strict: bool,
}

impl SyncArgs {
    pub fn run(self, explicit: Option<&Path>) -> Result<()> {
        let config = load_config(explicit)?;
        let (board, tracker) = connect(&config);

        let mut options = RunOptions::from_config(&config);
        options.dry_run = self.dry_run;
        if let Some(width) = self.batch_width {
            options.batch_width = width.max(1);
        }

        let report = runtime()?
            .block_on(pipeline::run(&board, &tracker, &config.schema, &options))
            .context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }

        let failed = report.failures.len() + report.taxonomy_failures.len();
        if self.strict && failed > 0 {
            bail!("{failed} item(s) failed");
        }
        Ok(())
    }
}

fn print_report(report: &RunReport) {
    let elapsed = report.finished_at - report.started_at;
    if report.dry_run {
        println!(
            "[dry-run] {} board pages, {} tracker records",
            report.board_pages, report.tracker_records
        );
        println!(
            "  would create {} tracker records, create {} board pages, update {} board pages",
            report.planned.create_on_tracker,
            report.planned.create_on_board,
            report.planned.update_on_board
        );
    } else {
        println!(
            "{} synced in {}ms ({} board pages, {} tracker records)",
            "✓".green().bold(),
            elapsed.num_milliseconds(),
            report.board_pages,
            report.tracker_records
        );
        println!(
            "  board: {} created, {} updated | tracker: {} created | taxonomy: {} created",
            report.board_created,
            report.board_updated,
            report.tracker_created,
            report.taxonomy_created
        );
    }

    for duplicate in &report.duplicates {
        println!(
            "  {} {} is claimed by {} and {}; kept {}",
            "!".yellow().bold(),
            duplicate.key,
            duplicate.kept,
            duplicate.dropped,
            duplicate.kept
        );
    }
    for invalid in &report.invalid_pages {
        println!("  {} skipped {}", "!".yellow().bold(), invalid.error);
    }
    for failure in &report.failures {
        println!(
            "  {} {} {}: {}",
            "✗".red().bold(),
            failure.action,
            failure.key,
            failure.error
        );
    }
    for failure in &report.taxonomy_failures {
        println!(
            "  {} {} '{}' for page {}: {}",
            "✗".red().bold(),
            failure.kind,
            failure.name.as_deref().unwrap_or(&failure.related.0),
            failure.page,
            failure.error
        );
    }
}
