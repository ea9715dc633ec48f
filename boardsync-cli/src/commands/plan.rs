//! `boardsync plan`: the action set a sync would apply, without writing.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use boardsync_sync::{pipeline, Plan};

use super::{connect, load_config, runtime};

/// Arguments for `boardsync plan`.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "action")]
    action: &'static str,
    #[tabled(rename = "board page")]
    page: String,
    #[tabled(rename = "record")]
    record: String,
    #[tabled(rename = "title")]
    title: String,
}

impl PlanArgs {
    pub fn run(self, explicit: Option<&Path>) -> Result<()> {
        let config = load_config(explicit)?;
        let (board, tracker) = connect(&config);

        let plan = runtime()?
            .block_on(pipeline::plan(&board, &tracker, &config.schema))
            .context("planning failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&plan).context("failed to serialize plan")?
            );
            return Ok(());
        }
        print_table(&plan);
        Ok(())
    }
}

fn print_table(plan: &Plan) {
    let counts = plan.actions.counts();
    println!(
        "{} board pages | {} tracker records | {} to create on tracker | {} to create on board | {} to update",
        plan.board_pages,
        plan.tracker_records,
        counts.create_on_tracker,
        counts.create_on_board,
        counts.update_on_board,
    );

    if plan.actions.is_empty() {
        println!("Nothing to do.");
    } else {
        let mut rows = Vec::new();
        rows.extend(plan.actions.create_on_tracker.iter().map(|page| PlanRow {
            action: "create on tracker",
            page: page.id.to_string(),
            record: "-".into(),
            title: page.title_text(),
        }));
        rows.extend(plan.actions.create_on_board.iter().map(|record| PlanRow {
            action: "create on board",
            page: "-".into(),
            record: record.number.to_string(),
            title: record.title.clone(),
        }));
        rows.extend(plan.actions.update_on_board.iter().map(|update| PlanRow {
            action: "update on board",
            page: update.page_id.to_string(),
            record: update.record.number.to_string(),
            title: update.record.title.clone(),
        }));
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    for duplicate in &plan.duplicates {
        println!(
            "{} {} claimed by {} and {}; {} wins",
            "!".yellow().bold(),
            duplicate.key,
            duplicate.kept,
            duplicate.dropped,
            duplicate.kept
        );
    }
    for invalid in &plan.invalid_pages {
        println!("{} {}", "!".yellow().bold(), invalid.error);
    }
}
