//! GitHub issues as a [`TrackerStore`].
//!
//! Label-kind taxonomy lives in repository labels named `"{kind}/{name}"`;
//! labels outside the managed prefixes are ignored. Milestones map onto
//! GitHub milestones by title.

use async_trait::async_trait;
use serde_json::{json, Value};

use boardsync_core::types::{composite_name, split_composite_name};
use boardsync_core::{
    IssueNumber, NewTrackerRecord, StoreError, SyncConfig, TaxonomyEntity, TaxonomyKind,
    TrackerRecord, TrackerState, TrackerStore,
};

use crate::http::HttpClient;

const PER_PAGE: usize = 100;

pub struct GithubTracker {
    http: HttpClient,
    repo_path: String,
}

impl GithubTracker {
    pub fn new(http: HttpClient, owner: &str, repo: &str) -> Self {
        Self {
            http,
            repo_path: format!("/repos/{owner}/{repo}"),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        let token = config.tracker.token.clone().unwrap_or_default();
        let headers = vec![
            ("Authorization".to_owned(), format!("Bearer {token}")),
            ("Accept".to_owned(), "application/vnd.github+json".to_owned()),
            ("X-GitHub-Api-Version".to_owned(), "2022-11-28".to_owned()),
            (
                "User-Agent".to_owned(),
                concat!("boardsync/", env!("CARGO_PKG_VERSION")).to_owned(),
            ),
        ];
        let http = HttpClient::new(&config.tracker.api_base, headers, &config.http);
        Self::new(http, &config.tracker.owner, &config.tracker.repo)
    }

    /// Every item of a paginated list endpoint.
    async fn list_all(&self, path: &str, state_all: bool) -> Result<Vec<Value>, StoreError> {
        let path = format!("{}{}", self.repo_path, path);
        let mut items = Vec::new();
        for page in 1.. {
            let mut query = vec![
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if state_all {
                query.push(("state", "all".to_owned()));
            }
            let response = self.http.get(&path, &query).await?;
            let batch = match response {
                Value::Array(batch) => batch,
                Value::Null => Vec::new(),
                other => {
                    return Err(StoreError::Decode(format!(
                        "expected a list from {path}, got {other}"
                    )))
                }
            };
            let last = batch.len() < PER_PAGE;
            items.extend(batch);
            if last {
                break;
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl TrackerStore for GithubTracker {
    async fn list_records(&self) -> Result<Vec<TrackerRecord>, StoreError> {
        let items = self.list_all("/issues", true).await?;
        let records = items
            .iter()
            .filter(|item| item.get("pull_request").is_none())
            .map(decode_issue)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(records = records.len(), "listed tracker records");
        Ok(records)
    }

    async fn create_record(&self, record: NewTrackerRecord) -> Result<TrackerRecord, StoreError> {
        let mut body = json!({
            "title": record.title,
            "labels": record.labels,
        });
        if let Some(milestone) = record.milestone {
            body["milestone"] = json!(milestone);
        }
        let response = self
            .http
            .post(&format!("{}/issues", self.repo_path), body)
            .await?;
        decode_issue(&response)
    }

    async fn delete_record(&self, number: IssueNumber) -> Result<(), StoreError> {
        self.http
            .delete(&format!("{}/issues/{}", self.repo_path, number.0))
            .await
    }

    async fn list_taxonomy(&self) -> Result<Vec<TaxonomyEntity>, StoreError> {
        let labels = self.list_all("/labels", false).await?;
        let milestones = self.list_all("/milestones", true).await?;

        let mut entities: Vec<TaxonomyEntity> = labels
            .iter()
            .filter_map(|label| {
                let (kind, name) = split_composite_name(label["name"].as_str()?)?;
                kind.is_label()
                    .then(|| TaxonomyEntity::new(kind, name, label["id"].as_u64()))
            })
            .collect();
        entities.extend(milestones.iter().filter_map(|milestone| {
            Some(TaxonomyEntity::new(
                TaxonomyKind::Milestone,
                milestone["title"].as_str()?,
                milestone["number"].as_u64(),
            ))
        }));
        tracing::debug!(
            labels = labels.len(),
            milestones = milestones.len(),
            managed = entities.len(),
            "listed tracker taxonomy"
        );
        Ok(entities)
    }

    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<TaxonomyEntity, StoreError> {
        let composite = composite_name(kind, name);
        let result = if kind.is_label() {
            let body = json!({ "name": composite, "color": label_color(kind) });
            self.http
                .post(&format!("{}/labels", self.repo_path), body)
                .await
                .map(|label| TaxonomyEntity::new(kind, name, label["id"].as_u64()))
        } else {
            let body = json!({ "title": name });
            self.http
                .post(&format!("{}/milestones", self.repo_path), body)
                .await
                .map(|milestone| TaxonomyEntity::new(kind, name, milestone["number"].as_u64()))
        };

        result.map_err(|err| match err {
            StoreError::Http { status: 422, body } if body.contains("already_exists") => {
                StoreError::AlreadyExists { what: composite }
            }
            other => other,
        })
    }
}

fn label_color(kind: TaxonomyKind) -> &'static str {
    match kind {
        TaxonomyKind::Feature => "1d76db",
        TaxonomyKind::EntryType => "5319e7",
        TaxonomyKind::Priority => "d93f0b",
        TaxonomyKind::Points => "0e8a16",
        TaxonomyKind::Milestone => "ededed",
    }
}

fn decode_issue(item: &Value) -> Result<TrackerRecord, StoreError> {
    let number = item["number"]
        .as_u64()
        .ok_or_else(|| StoreError::Decode("issue without number".into()))?;
    let title = item["title"].as_str().unwrap_or_default();
    let state = TrackerState::from(item["state"].as_str().unwrap_or("open"));

    let mut record = TrackerRecord::new(number, title, state);
    record.comment_count = item["comments"].as_u64().unwrap_or(0);
    record.url = item["html_url"].as_str().map(str::to_owned);
    record.labels = item["labels"]
        .as_array()
        .map(|labels| {
            labels
                .iter()
                .filter_map(|label| label["name"].as_str().map(str::to_owned))
                .collect()
        })
        .unwrap_or_default();
    record.milestone = item["milestone"]["number"].as_u64();
    Ok(record)
}
