//! Run configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.boardsync/
//!   config.yaml   (mode 0600, holds API tokens)
//! ```
//!
//! # API pattern
//!
//! As with every home-rooted file in this workspace:
//! - `fn_at(home: &Path, …)`: explicit home, used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Environment variables override the file after loading
//! ([`SyncConfig::apply_env`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Default number of board operations run concurrently in one group.
pub const DEFAULT_BATCH_WIDTH: usize = 10;

pub const ENV_BOARD_TOKEN: &str = "NOTION_KEY";
pub const ENV_BOARD_DATABASE: &str = "NOTION_DATABASE_ID";
pub const ENV_TRACKER_TOKEN: &str = "GITHUB_KEY";
pub const ENV_TRACKER_OWNER: &str = "GITHUB_REPO_OWNER";
pub const ENV_TRACKER_REPO: &str = "GITHUB_REPO_NAME";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub board: BoardConfig,
    pub tracker: TrackerConfig,
    pub schema: BoardSchema,
    pub batch_width: usize,
    pub http: HttpConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            board: BoardConfig::default(),
            tracker: TrackerConfig::default(),
            schema: BoardSchema::default(),
            batch_width: DEFAULT_BATCH_WIDTH,
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub database_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_base: String,
    pub api_version: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            database_id: String::new(),
            token: None,
            api_base: "https://api.notion.com/v1".into(),
            api_version: "2022-06-28".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub owner: String,
    pub repo: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub api_base: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: None,
            api_base: "https://api.github.com".into(),
        }
    }
}

/// Column type backing the status property. Read either way; this decides
/// the shape that is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusColumn {
    #[default]
    Select,
    Status,
}

/// Board property names and status buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSchema {
    pub title: String,
    pub cross_ref: String,
    pub status: String,
    pub status_column: StatusColumn,
    /// Omitted when the database has no comment-count column.
    pub comment_count: Option<String>,
    /// Omitted when the database has no URL column.
    pub url: Option<String>,
    pub feature: String,
    pub priority: String,
    pub points: String,
    pub entry_type: String,
    pub milestone: String,
    /// Number property on milestone pages holding the tracker milestone.
    pub milestone_number: String,
    pub open_status: String,
    pub closed_status: String,
}

impl Default for BoardSchema {
    fn default() -> Self {
        Self {
            title: "Name".into(),
            cross_ref: "Issue Number".into(),
            status: "State".into(),
            status_column: StatusColumn::Select,
            comment_count: Some("Number of Comments".into()),
            url: Some("Issue URL".into()),
            feature: "Feature".into(),
            priority: "Priority".into(),
            points: "Points".into(),
            entry_type: "Type".into(),
            milestone: "Milestone".into(),
            milestone_number: "Milestone Number".into(),
            open_status: "Backlog".into(),
            closed_status: "Ready for QA".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Retries after a rate-limit response before giving up.
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

impl SyncConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(token) = get(ENV_BOARD_TOKEN) {
            self.board.token = Some(token);
        }
        if let Some(id) = get(ENV_BOARD_DATABASE) {
            self.board.database_id = id;
        }
        if let Some(token) = get(ENV_TRACKER_TOKEN) {
            self.tracker.token = Some(token);
        }
        if let Some(owner) = get(ENV_TRACKER_OWNER) {
            self.tracker.owner = owner;
        }
        if let Some(repo) = get(ENV_TRACKER_REPO) {
            self.tracker.repo = repo;
        }
    }

    /// Reports the first required field that is still empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank = |value: &str| value.trim().is_empty();
        let required: [(&'static str, bool); 5] = [
            ("board.database_id", blank(&self.board.database_id)),
            (
                "board.token",
                self.board.token.as_deref().map_or(true, blank),
            ),
            ("tracker.owner", blank(&self.tracker.owner)),
            ("tracker.repo", blank(&self.tracker.repo)),
            (
                "tracker.token",
                self.tracker.token.as_deref().map_or(true, blank),
            ),
        ];
        match required.iter().find(|(_, missing)| *missing) {
            Some((field, _)) => Err(ConfigError::Missing { field: *field }),
            None => Ok(()),
        }
    }

    /// Batch width with the zero case folded to one.
    pub fn effective_batch_width(&self) -> usize {
        self.batch_width.max(1)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.boardsync/config.yaml`, pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".boardsync").join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the config file at `path` without applying environment overrides.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` if malformed.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.boardsync/config.yaml`.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home()?)
}

/// Atomically save `config` to `path`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
pub fn save_to(path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let yaml = serde_yaml::to_string(config)?;
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    set_file_permissions(&tmp)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Save to `<home>/.boardsync/config.yaml`.
pub fn save_at(home: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    save_to(&config_path_at(home), config)
}

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn complete() -> SyncConfig {
        let mut config = SyncConfig::default();
        config.board.database_id = "db-1".into();
        config.board.token = Some("secret_board".into());
        config.tracker.owner = "acme".into();
        config.tracker.repo = "widgets".into();
        config.tracker.token = Some("ghp_tracker".into());
        config
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "board:\n  database_id: abc\nbatch_width: 4\n";
        let config: SyncConfig = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.board.database_id, "abc");
        assert_eq!(config.board.api_version, "2022-06-28");
        assert_eq!(config.batch_width, 4);
        assert_eq!(config.schema.cross_ref, "Issue Number");
        assert_eq!(config.http.max_retries, 3);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let home = TempDir::new().unwrap();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
        assert!(err.to_string().contains("boardsync init"));
    }

    #[test]
    fn malformed_file_reports_parse_error_with_path() {
        let home = TempDir::new().unwrap();
        let path = config_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "- a list, not a mapping\n").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn save_then_load_roundtrips_and_cleans_tmp() {
        let home = TempDir::new().unwrap();
        let config = complete();
        save_at(home.path(), &config).expect("save");
        let loaded = load_at(home.path()).expect("load");
        assert_eq!(loaded, config);

        let tmp = config_path_at(home.path()).with_extension("yaml.tmp");
        assert!(!tmp.exists(), ".tmp must be removed after successful save");
    }

    #[test]
    #[cfg(unix)]
    fn saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        save_at(home.path(), &complete()).expect("save");
        let mode = std::fs::metadata(config_path_at(home.path()))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = complete();
        let env: HashMap<&str, &str> = [
            (ENV_TRACKER_TOKEN, "from_env"),
            (ENV_TRACKER_REPO, "gadgets"),
            (ENV_BOARD_DATABASE, "   "),
        ]
        .into_iter()
        .collect();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.tracker.token.as_deref(), Some("from_env"));
        assert_eq!(config.tracker.repo, "gadgets");
        assert_eq!(config.board.database_id, "db-1", "blank env is ignored");
    }

    #[test]
    fn validate_names_first_missing_field() {
        assert!(complete().validate().is_ok());

        let mut config = complete();
        config.tracker.token = None;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Missing {
                field: "tracker.token"
            }
        ));

        let err = SyncConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("board.database_id"));
    }

    #[test]
    fn zero_batch_width_is_clamped() {
        let mut config = complete();
        config.batch_width = 0;
        assert_eq!(config.effective_batch_width(), 1);
    }
}
