use std::path::Path;

use assert_cmd::Command;
use boardsync_core::{config, SyncConfig};
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENV_VARS: [&str; 6] = [
    "NOTION_KEY",
    "NOTION_DATABASE_ID",
    "GITHUB_KEY",
    "GITHUB_REPO_OWNER",
    "GITHUB_REPO_NAME",
    "RUST_LOG",
];

fn boardsync(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("boardsync").expect("boardsync binary");
    cmd.env("HOME", home);
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(home: &Path, notion: &MockServer, github: &MockServer) {
    let mut config = SyncConfig::default();
    config.board.database_id = "db1".into();
    config.board.token = Some("notion-token".into());
    config.board.api_base = notion.uri();
    config.tracker.owner = "acme".into();
    config.tracker.repo = "widgets".into();
    config.tracker.token = Some("github-token".into());
    config.tracker.api_base = github.uri();
    config.http.max_retries = 0;
    config::save_at(home, &config).expect("save config");
}

async fn mock_stores() -> (MockServer, MockServer) {
    let notion = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/databases/db1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "id": "p1",
                "properties": {
                    "Name": { "type": "title", "title": [{ "plain_text": "Add retry logic" }] },
                    "Issue Number": { "type": "number", "number": -1 }
                }
            }],
            "has_more": false,
            "next_cursor": null
        })))
        .mount(&notion)
        .await;
    Mock::given(method("POST"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&notion)
        .await;

    let github = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/acme/widgets/issues"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 12, "title": "Old bug", "state": "closed" }
        ])))
        .mount(&github)
        .await;
    Mock::given(method("POST"))
        .and(path("/repos/acme/widgets/issues"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&github)
        .await;

    (notion, github)
}

#[test]
fn init_writes_config_and_refuses_overwrite() {
    let home = TempDir::new().unwrap();
    let args = [
        "init",
        "--database-id",
        "db1",
        "--owner",
        "acme",
        "--repo",
        "widgets",
    ];

    boardsync(home.path())
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yaml"));

    let saved = config::load_at(home.path()).expect("load");
    assert_eq!(saved.board.database_id, "db1");
    assert_eq!(saved.tracker.repo, "widgets");
    assert_eq!(saved.board.token, None);

    boardsync(home.path())
        .args(args)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    boardsync(home.path())
        .args(args)
        .arg("--force")
        .assert()
        .success();
}

#[test]
fn sync_without_config_points_at_init() {
    let home = TempDir::new().unwrap();
    boardsync(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("boardsync init"));
}

#[test]
fn sync_with_env_only_reports_missing_token() {
    let home = TempDir::new().unwrap();
    boardsync(home.path())
        .arg("sync")
        .env("NOTION_DATABASE_ID", "db1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("board.token"));
}

#[test]
fn prune_requires_threshold() {
    let home = TempDir::new().unwrap();
    boardsync(home.path())
        .arg("prune")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--below"));
}

#[tokio::test(flavor = "multi_thread")]
async fn plan_json_lists_actions() {
    let (notion, github) = mock_stores().await;
    let home = TempDir::new().unwrap();
    write_config(home.path(), &notion, &github);

    let home_path = home.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        boardsync(&home_path)
            .args(["plan", "--json"])
            .output()
            .expect("run boardsync")
    })
    .await
    .expect("join");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let plan: Value = serde_json::from_slice(&output.stdout).expect("plan JSON");
    assert_eq!(plan["board_pages"], 1);
    assert_eq!(plan["tracker_records"], 1);
    assert_eq!(plan["actions"]["create_on_tracker"][0]["id"], "p1");
    assert_eq!(plan["actions"]["create_on_board"][0]["number"], 12);
    assert_eq!(
        plan["actions"]["update_on_board"].as_array().map(Vec::len),
        Some(0)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_dry_run_writes_nothing() {
    let (notion, github) = mock_stores().await;
    let home = TempDir::new().unwrap();
    write_config(home.path(), &notion, &github);

    let home_path = home.path().to_path_buf();
    let output = tokio::task::spawn_blocking(move || {
        boardsync(&home_path)
            .args(["sync", "--dry-run", "--json", "--strict"])
            .output()
            .expect("run boardsync")
    })
    .await
    .expect("join");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(report["dry_run"], true);
    assert_eq!(report["planned"]["create_on_tracker"], 1);
    assert_eq!(report["planned"]["create_on_board"], 1);
    assert_eq!(report["tracker_created"], 0);
    // Dropping the servers verifies the `expect(0)` write mocks.
}
