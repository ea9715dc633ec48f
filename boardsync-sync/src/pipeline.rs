//! The reconciliation run: fetch, match, partition, apply.
//!
//! Stages, in order:
//!
//! 1. list board pages and tracker records (fatal on failure);
//! 2. validate pages, build the cross-ref index, partition into actions
//!    (pages that fail validation are never written to);
//! 3. load the tracker taxonomy when any page needs a tracker record;
//! 4. board creates, then board updates, each in bounded groups;
//! 5. tracker creates, one page at a time, each followed by the board
//!    write-back of its new cross-ref.
//!
//! Step 5 is sequential because taxonomy resolution shares a mutable cache
//! and links milestone pages as it goes.

use std::collections::HashSet;

use chrono::Utc;
use futures::future::join;
use serde::Serialize;

use boardsync_core::config::DEFAULT_BATCH_WIDTH;
use boardsync_core::{BoardSchema, BoardStore, SyncConfig, TrackerStore};

use crate::batch::{apply_in_groups, ApplyAction, ApplyFailure};
use crate::error::{Stage, SyncError};
use crate::mapper::{PageRelations, PageView, PropertyMapper};
use crate::matcher::{build_index, DuplicateKey};
use crate::reconcile::{reconcile, ActionSet, BoardUpdate};
use crate::report::{InvalidPage, RunReport};
use crate::taxonomy::TaxonomyResolver;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute the plan and stop before the first write.
    pub dry_run: bool,
    pub batch_width: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            batch_width: DEFAULT_BATCH_WIDTH,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            dry_run: false,
            batch_width: config.effective_batch_width(),
        }
    }
}

/// Everything a run would do, computed without writing.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub actions: ActionSet,
    pub duplicates: Vec<DuplicateKey>,
    pub invalid_pages: Vec<InvalidPage>,
    pub board_pages: usize,
    pub tracker_records: usize,
}

/// Fetch both stores and partition their contents into actions.
pub async fn plan(
    board: &dyn BoardStore,
    tracker: &dyn TrackerStore,
    schema: &BoardSchema,
) -> Result<Plan, SyncError> {
    let (pages, records) = join(board.list_pages(), tracker.list_records()).await;
    let pages = pages.map_err(SyncError::stage(Stage::ListBoardPages))?;
    let records = records.map_err(SyncError::stage(Stage::ListTrackerRecords))?;
    tracing::info!(
        board_pages = pages.len(),
        tracker_records = records.len(),
        "fetched snapshot"
    );

    let mapper = PropertyMapper::new(schema);
    let mut views = Vec::with_capacity(pages.len());
    let mut invalid_pages = Vec::new();
    let mut quarantined = HashSet::new();
    for page in &pages {
        match mapper.page_view(page) {
            Ok(view) => views.push(view),
            Err(err) => {
                tracing::warn!(page = %page.id, error = %err, "skipping page that does not fit the schema");
                if let Some(key) = mapper.salvage_cross_ref(page) {
                    // Indexed so its record is neither mirrored again nor
                    // written to; a linked page never joins the creation set.
                    quarantined.insert(page.id.clone());
                    views.push(PageView {
                        id: page.id.clone(),
                        cross_ref: Some(key),
                        title: Vec::new(),
                        status: None,
                        relations: PageRelations::default(),
                    });
                }
                invalid_pages.push(InvalidPage {
                    page: page.id.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    let index = build_index(&views);
    let tracker_records = records.len();
    let mut actions = reconcile(&views, records, &index);
    actions.update_on_board.retain(|update| {
        let keep = !quarantined.contains(&update.page_id);
        if !keep {
            tracing::debug!(page = %update.page_id, record = %update.record.number, "not updating invalid page");
        }
        keep
    });
    let counts = actions.counts();
    tracing::info!(
        create_on_tracker = counts.create_on_tracker,
        create_on_board = counts.create_on_board,
        update_on_board = counts.update_on_board,
        "planned"
    );

    Ok(Plan {
        actions,
        duplicates: index.duplicates().to_vec(),
        invalid_pages,
        board_pages: pages.len(),
        tracker_records,
    })
}

/// One full reconciliation run.
///
/// Only the fetch stages can fail the run. Every per-item failure is
/// recorded in the returned report and leaves its item to be retried by the
/// next run.
pub async fn run(
    board: &dyn BoardStore,
    tracker: &dyn TrackerStore,
    schema: &BoardSchema,
    options: &RunOptions,
) -> Result<RunReport, SyncError> {
    let started_at = Utc::now();
    let plan = plan(board, tracker, schema).await?;

    let mut report = RunReport::new(started_at, options.dry_run);
    report.board_pages = plan.board_pages;
    report.tracker_records = plan.tracker_records;
    report.planned = plan.actions.counts();
    report.duplicates = plan.duplicates;
    report.invalid_pages = plan.invalid_pages;

    if options.dry_run {
        tracing::info!("dry run, nothing written");
        return Ok(report.finish());
    }

    let ActionSet {
        create_on_tracker,
        create_on_board,
        update_on_board,
    } = plan.actions;
    let mapper = PropertyMapper::new(schema);

    let mut resolver = TaxonomyResolver::new(board, tracker, mapper);
    if !create_on_tracker.is_empty() {
        resolver.load().await?;
    }

    let created = apply_in_groups(
        create_on_board,
        options.batch_width,
        ApplyAction::CreateOnBoard,
        |record| record.number.to_string(),
        |record| {
            let properties = mapper.record_properties(&record);
            async move { board.create_page(properties).await.map(|_| ()) }
        },
    )
    .await;
    report.board_created = created.succeeded;
    report.failures.extend(created.failures);

    let updated = apply_in_groups(
        update_on_board,
        options.batch_width,
        ApplyAction::UpdateOnBoard,
        |update| format!("{} ({})", update.record.number, update.page_id),
        |BoardUpdate { page_id, record }| {
            let properties = mapper.record_properties(&record);
            async move { board.update_page(&page_id, properties).await }
        },
    )
    .await;
    report.board_updated = updated.succeeded;
    report.failures.extend(updated.failures);

    for page in &create_on_tracker {
        let taxonomy = resolver.resolve(page).await;
        let payload = mapper.creation_payload(page, taxonomy);
        let record = match tracker.create_record(payload).await {
            Ok(record) => record,
            Err(err) => {
                report.failures.push(ApplyFailure::new(
                    ApplyAction::CreateOnTracker,
                    page.id.to_string(),
                    &err,
                ));
                continue;
            }
        };
        report.tracker_created += 1;
        tracing::info!(page = %page.id, record = %record.number, "created tracker record");

        let link = mapper.link_properties(&record);
        if let Err(err) = board.update_page(&page.id, link).await {
            report.failures.push(ApplyFailure::new(
                ApplyAction::LinkOnBoard,
                format!("{} -> {}", page.id, record.number),
                &err,
            ));
        }
    }

    report.taxonomy_created = resolver.created();
    report.taxonomy_failures = resolver.into_failures();
    Ok(report.finish())
}
