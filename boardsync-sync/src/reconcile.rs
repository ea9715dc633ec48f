//! Three-way partition of a run's snapshot into actions.
//!
//! Board-to-tracker divergence is only ever detected through the unlinked
//! sentinel. Tracker-to-board is always pushed as an update, so the tracker
//! wins whenever both sides changed.

use serde::Serialize;

use boardsync_core::{PageId, TrackerRecord};

use crate::mapper::PageView;
use crate::matcher::CrossRefIndex;

/// A linked page and the record it mirrors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardUpdate {
    pub page_id: PageId,
    pub record: TrackerRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionSet {
    /// Unlinked board pages, in snapshot order.
    pub create_on_tracker: Vec<PageView>,
    /// Records no board page points at.
    pub create_on_board: Vec<TrackerRecord>,
    pub update_on_board: Vec<BoardUpdate>,
}

impl ActionSet {
    pub fn is_empty(&self) -> bool {
        self.create_on_tracker.is_empty()
            && self.create_on_board.is_empty()
            && self.update_on_board.is_empty()
    }

    pub fn counts(&self) -> ActionCounts {
        ActionCounts {
            create_on_tracker: self.create_on_tracker.len(),
            create_on_board: self.create_on_board.len(),
            update_on_board: self.update_on_board.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub create_on_tracker: usize,
    pub create_on_board: usize,
    pub update_on_board: usize,
}

/// Every unlinked page lands in `create_on_tracker` exactly once; every
/// record lands in exactly one of `create_on_board` / `update_on_board`.
pub fn reconcile(
    pages: &[PageView],
    records: Vec<TrackerRecord>,
    index: &CrossRefIndex,
) -> ActionSet {
    let create_on_tracker = pages
        .iter()
        .filter(|page| page.is_unlinked())
        .cloned()
        .collect();

    let mut create_on_board = Vec::new();
    let mut update_on_board = Vec::new();
    for record in records {
        match index.get(record.number) {
            Some(page_id) => update_on_board.push(BoardUpdate {
                page_id: page_id.clone(),
                record,
            }),
            None => create_on_board.push(record),
        }
    }

    ActionSet {
        create_on_tracker,
        create_on_board,
        update_on_board,
    }
}

#[cfg(test)]
mod tests {
    use boardsync_core::{IssueNumber, TrackerState};

    use crate::mapper::PageRelations;
    use crate::matcher::build_index;

    use super::*;

    fn view(id: &str, cross_ref: Option<u64>) -> PageView {
        PageView {
            id: PageId::from(id),
            cross_ref: cross_ref.map(IssueNumber),
            title: vec![format!("title of {id}")],
            status: None,
            relations: PageRelations::default(),
        }
    }

    #[test]
    fn partitions_every_record_exactly_once() {
        let pages = vec![view("a", Some(1)), view("b", None), view("c", Some(3))];
        let records = vec![
            TrackerRecord::new(1, "one", TrackerState::Open),
            TrackerRecord::new(2, "two", TrackerState::Closed),
            TrackerRecord::new(3, "three", TrackerState::Open),
        ];
        let index = build_index(&pages);

        let actions = reconcile(&pages, records, &index);

        assert_eq!(actions.create_on_tracker.len(), 1);
        assert_eq!(actions.create_on_tracker[0].id, PageId::from("b"));

        let created: Vec<u64> = actions
            .create_on_board
            .iter()
            .map(|r| r.number.0)
            .collect();
        assert_eq!(created, vec![2]);

        let updated: Vec<(String, u64)> = actions
            .update_on_board
            .iter()
            .map(|u| (u.page_id.to_string(), u.record.number.0))
            .collect();
        assert_eq!(updated, vec![("a".into(), 1), ("c".into(), 3)]);
    }

    #[test]
    fn linked_page_without_record_is_left_alone() {
        let pages = vec![view("a", Some(99))];
        let index = build_index(&pages);
        let actions = reconcile(&pages, Vec::new(), &index);
        assert!(actions.is_empty());
    }

    #[test]
    fn unmatched_closed_record_becomes_board_create() {
        let actions = reconcile(
            &[],
            vec![TrackerRecord::new(12, "old", TrackerState::Closed)],
            &CrossRefIndex::default(),
        );
        assert_eq!(
            actions.counts(),
            ActionCounts {
                create_on_tracker: 0,
                create_on_board: 1,
                update_on_board: 0,
            }
        );
    }
}
