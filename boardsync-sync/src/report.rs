//! Per-run summary handed back to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boardsync_core::PageId;

use crate::batch::ApplyFailure;
use crate::matcher::DuplicateKey;
use crate::reconcile::ActionCounts;
use crate::taxonomy::TaxonomyFailure;

/// A board page skipped because it does not fit the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidPage {
    pub page: PageId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub board_pages: usize,
    pub tracker_records: usize,
    pub planned: ActionCounts,
    pub duplicates: Vec<DuplicateKey>,
    pub invalid_pages: Vec<InvalidPage>,
    pub board_created: usize,
    pub board_updated: usize,
    pub tracker_created: usize,
    pub taxonomy_created: usize,
    pub failures: Vec<ApplyFailure>,
    pub taxonomy_failures: Vec<TaxonomyFailure>,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            dry_run,
            board_pages: 0,
            tracker_records: 0,
            planned: ActionCounts::default(),
            duplicates: Vec::new(),
            invalid_pages: Vec::new(),
            board_created: 0,
            board_updated: 0,
            tracker_created: 0,
            taxonomy_created: 0,
            failures: Vec::new(),
            taxonomy_failures: Vec::new(),
        }
    }

    /// Any per-item or taxonomy failure.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty() || !self.taxonomy_failures.is_empty()
    }

    /// Integrity warnings found while reading the board.
    pub fn has_warnings(&self) -> bool {
        !self.duplicates.is_empty() || !self.invalid_pages.is_empty()
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        tracing::info!(
            dry_run = self.dry_run,
            board_created = self.board_created,
            board_updated = self.board_updated,
            tracker_created = self.tracker_created,
            taxonomy_created = self.taxonomy_created,
            failures = self.failures.len(),
            taxonomy_failures = self.taxonomy_failures.len(),
            "run finished"
        );
        self
    }
}
