//! Bounded-concurrency application of store writes.
//!
//! Items are split into groups of `width`; each group runs concurrently and
//! is joined before the next one starts. A failed item is recorded and never
//! cancels its siblings or later groups.

use std::fmt;
use std::future::Future;

use futures::future::join_all;
use serde::Serialize;

use boardsync_core::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyAction {
    CreateOnBoard,
    UpdateOnBoard,
    CreateOnTracker,
    /// Write-back of the cross-ref after a tracker creation.
    LinkOnBoard,
    DeleteOnTracker,
}

impl fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApplyAction::CreateOnBoard => "create on board",
            ApplyAction::UpdateOnBoard => "update on board",
            ApplyAction::CreateOnTracker => "create on tracker",
            ApplyAction::LinkOnBoard => "link on board",
            ApplyAction::DeleteOnTracker => "delete on tracker",
        };
        f.write_str(label)
    }
}

/// One item that did not make it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyFailure {
    pub action: ApplyAction,
    /// Record number or page id, whatever identifies the item to a human.
    pub key: String,
    pub error: String,
}

impl ApplyFailure {
    pub fn new(action: ApplyAction, key: impl Into<String>, error: &StoreError) -> Self {
        let failure = Self {
            action,
            key: key.into(),
            error: error.to_string(),
        };
        tracing::warn!(
            action = %failure.action,
            key = %failure.key,
            error = %failure.error,
            "item failed"
        );
        failure
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub succeeded: usize,
    pub failures: Vec<ApplyFailure>,
}

/// Run `op` over `items` in concurrent groups of `width` (at least 1).
pub async fn apply_in_groups<T, K, F, Fut>(
    items: Vec<T>,
    width: usize,
    action: ApplyAction,
    key_of: K,
    op: F,
) -> ApplyOutcome
where
    K: Fn(&T) -> String,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<(), StoreError>>,
{
    let width = width.max(1);
    let total = items.len();
    let mut outcome = ApplyOutcome::default();
    let mut items = items.into_iter().peekable();
    let mut group_no = 0usize;

    while items.peek().is_some() {
        let group: Vec<T> = items.by_ref().take(width).collect();
        group_no += 1;
        tracing::debug!(action = %action, group = group_no, size = group.len(), "applying group");

        let keys: Vec<String> = group.iter().map(&key_of).collect();
        let results = join_all(group.into_iter().map(&op)).await;

        for (key, result) in keys.into_iter().zip(results) {
            match result {
                Ok(()) => outcome.succeeded += 1,
                Err(err) => outcome.failures.push(ApplyFailure::new(action, key, &err)),
            }
        }
    }

    if total > 0 {
        tracing::info!(
            action = %action,
            succeeded = outcome.succeeded,
            failed = outcome.failures.len(),
            "applied"
        );
    }
    outcome
}
