//! Cross-reference index between board pages and tracker records.

use std::collections::HashMap;

use serde::Serialize;

use boardsync_core::{IssueNumber, PageId};

use crate::mapper::PageView;

/// Two board pages claiming the same tracker record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateKey {
    pub key: IssueNumber,
    pub kept: PageId,
    pub dropped: PageId,
}

/// `IssueNumber → PageId`, built fresh for every run.
#[derive(Debug, Clone, Default)]
pub struct CrossRefIndex {
    entries: HashMap<IssueNumber, PageId>,
    duplicates: Vec<DuplicateKey>,
}

impl CrossRefIndex {
    pub fn get(&self, key: IssueNumber) -> Option<&PageId> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: IssueNumber) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn duplicates(&self) -> &[DuplicateKey] {
        &self.duplicates
    }
}

/// Index every linked page by its cross-ref key, in one pass.
///
/// Unlinked pages are skipped. When two pages carry the same key the first
/// one in snapshot order wins and the other is reported as a duplicate.
pub fn build_index(pages: &[PageView]) -> CrossRefIndex {
    let mut index = CrossRefIndex::default();
    for page in pages {
        let Some(key) = page.cross_ref else {
            continue;
        };
        match index.entries.get(&key) {
            Some(kept) => {
                tracing::warn!(
                    key = %key,
                    kept = %kept,
                    dropped = %page.id,
                    "duplicate cross-ref on board, keeping first page"
                );
                index.duplicates.push(DuplicateKey {
                    key,
                    kept: kept.clone(),
                    dropped: page.id.clone(),
                });
            }
            None => {
                index.entries.insert(key, page.id.clone());
            }
        }
    }
    index
}
