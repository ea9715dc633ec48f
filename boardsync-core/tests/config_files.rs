//! Config file layout, atomic-write safety and env precedence.

use assert_fs::prelude::*;
use boardsync_core::{
    config::{self, SyncConfig},
    ConfigError, StatusColumn,
};
use predicates::prelude::predicate;
use std::fs;

fn filled() -> SyncConfig {
    let mut cfg = SyncConfig::default();
    cfg.board.database_id = "0f3c".into();
    cfg.board.token = Some("secret_abc".into());
    cfg.tracker.owner = "acme".into();
    cfg.tracker.repo = "widgets".into();
    cfg.tracker.token = Some("ghp_abc".into());
    cfg
}

#[test]
fn save_creates_config_under_dot_boardsync() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &filled()).expect("save");

    home.child(".boardsync/config.yaml")
        .assert(predicate::path::exists());
    home.child(".boardsync/config.yaml")
        .assert(predicate::str::contains("database_id: 0f3c"));
}

#[test]
fn mid_write_crash_leaves_original_intact() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    config::save_at(home.path(), &filled()).expect("save");

    let path = config::config_path_at(home.path());
    let original = fs::read(&path).expect("read original");

    // Simulate crash: .tmp written but process died before rename
    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, b"CRASH - INCOMPLETE WRITE").expect("write crash tmp");

    assert_eq!(fs::read(&path).expect("read after crash"), original);
    let loaded = config::load_at(home.path()).expect("load still works");
    assert_eq!(loaded, filled());
}

#[test]
fn env_wins_over_file_and_validates() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut partial = SyncConfig::default();
    partial.board.database_id = "0f3c".into();
    partial.tracker.owner = "acme".into();
    partial.tracker.repo = "widgets".into();
    config::save_at(home.path(), &partial).expect("save");

    let mut loaded = config::load_at(home.path()).expect("load");
    let err = loaded.validate().unwrap_err();
    assert!(matches!(err, ConfigError::Missing { field: "board.token" }));

    loaded.apply_env_with(|key| match key {
        "NOTION_KEY" => Some("secret_env".into()),
        "GITHUB_KEY" => Some("ghp_env".into()),
        _ => None,
    });
    loaded.validate().expect("complete after env");
    assert_eq!(loaded.board.token.as_deref(), Some("secret_env"));
}

#[test]
fn schema_overrides_survive_roundtrip() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = config::config_path_at(home.path());
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(
        &path,
        "schema:\n  status: Stage\n  status_column: status\n  open_status: Todo\n  comment_count: null\n",
    )
    .unwrap();

    let cfg = config::load_at(home.path()).expect("load");
    assert_eq!(cfg.schema.status, "Stage");
    assert_eq!(cfg.schema.status_column, StatusColumn::Status);
    assert_eq!(cfg.schema.open_status, "Todo");
    assert_eq!(cfg.schema.closed_status, "Ready for QA");
    assert!(cfg.schema.comment_count.is_none());
    assert_eq!(cfg.schema.url.as_deref(), Some("Issue URL"));
}
