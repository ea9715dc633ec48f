//! Subcommands and the plumbing they share.

pub mod init;
pub mod plan;
pub mod prune;
pub mod sync;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use boardsync_clients::{GithubTracker, NotionBoard};
use boardsync_core::{config, ConfigError, SyncConfig};

/// `--config` when given, otherwise `~/.boardsync/config.yaml`.
pub fn config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config::config_path().context("could not determine home directory"),
    }
}

/// Load the config file, apply environment overrides and validate.
///
/// A missing file is tolerated when the environment supplies every
/// required field.
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig> {
    let path = config_path(explicit)?;
    let (mut config, from_file) = match config::load_from(&path) {
        Ok(config) => (config, true),
        Err(ConfigError::NotFound { .. }) => (SyncConfig::default(), false),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to load '{}'", path.display()))
        }
    };
    config.apply_env();
    tracing::debug!(path = %path.display(), from_file, "config loaded");

    if let Err(err) = config.validate() {
        if from_file {
            return Err(err).with_context(|| format!("incomplete config '{}'", path.display()));
        }
        return Err(err).with_context(|| {
            format!(
                "no config at '{}'; run `boardsync init` or set NOTION_* / GITHUB_* variables",
                path.display()
            )
        });
    }
    Ok(config)
}

pub fn connect(config: &SyncConfig) -> (NotionBoard, GithubTracker) {
    (
        NotionBoard::from_config(config),
        GithubTracker::from_config(config),
    )
}

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}
