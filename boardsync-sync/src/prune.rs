//! Tracker maintenance: delete every record numbered below a threshold.
//!
//! Used to clear out records left behind by early experiments before the
//! board became the planning surface. The board is not touched; pages that
//! pointed at deleted records keep their stale cross-ref.

use serde::Serialize;

use boardsync_core::{IssueNumber, TrackerStore};

use crate::batch::{ApplyAction, ApplyFailure};
use crate::error::{Stage, SyncError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    pub below: u64,
    pub dry_run: bool,
    /// Records numbered below the threshold, ascending.
    pub candidates: Vec<IssueNumber>,
    pub deleted: usize,
    pub failures: Vec<ApplyFailure>,
}

/// Deletes one record at a time so a rejected delete is reported against
/// its own number.
pub async fn prune_below(
    tracker: &dyn TrackerStore,
    below: u64,
    dry_run: bool,
) -> Result<PruneReport, SyncError> {
    let records = tracker
        .list_records()
        .await
        .map_err(SyncError::stage(Stage::ListTrackerRecords))?;

    let mut candidates: Vec<IssueNumber> = records
        .iter()
        .map(|record| record.number)
        .filter(|number| number.0 < below)
        .collect();
    candidates.sort_unstable();

    let mut report = PruneReport {
        below,
        dry_run,
        candidates,
        ..PruneReport::default()
    };
    tracing::info!(
        below,
        candidates = report.candidates.len(),
        dry_run,
        "prune candidates"
    );
    if dry_run {
        return Ok(report);
    }

    for number in report.candidates.clone() {
        match tracker.delete_record(number).await {
            Ok(()) => {
                report.deleted += 1;
                tracing::info!(record = %number, "deleted tracker record");
            }
            Err(err) => report.failures.push(ApplyFailure::new(
                ApplyAction::DeleteOnTracker,
                number.to_string(),
                &err,
            )),
        }
    }
    Ok(report)
}
