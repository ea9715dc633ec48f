//! `boardsync init --database-id <id> --owner <owner> --repo <repo> [--force]`

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use boardsync_core::{config, SyncConfig};

use super::config_path;

/// Write a skeleton config file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Id of the Notion database to sync.
    #[arg(long)]
    pub database_id: String,

    /// GitHub repository owner.
    #[arg(long)]
    pub owner: String,

    /// GitHub repository name.
    #[arg(long)]
    pub repo: String,

    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, explicit: Option<&Path>) -> Result<()> {
        let path = config_path(explicit)?;
        if path.exists() && !self.force {
            bail!(
                "config already exists at '{}'; pass --force to overwrite",
                path.display()
            );
        }

        let mut config = SyncConfig::default();
        config.board.database_id = self.database_id;
        config.tracker.owner = self.owner;
        config.tracker.repo = self.repo;

        config::save_to(&path, &config)
            .with_context(|| format!("failed to write '{}'", path.display()))?;

        println!("✓ Wrote {}", path.display());
        println!(
            "  Set {} and {} (or add tokens to the file) before running `boardsync sync`.",
            config::ENV_BOARD_TOKEN,
            config::ENV_TRACKER_TOKEN
        );
        Ok(())
    }
}
