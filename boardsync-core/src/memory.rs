//! In-memory stores that record every call.
//!
//! Backs the engine's test suites. Failure injection is per item so tests
//! can check that one bad entry does not take its siblings down.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::store::{BoardStore, TrackerStore};
use crate::types::{
    composite_name, BoardPage, IssueNumber, NewTrackerRecord, PageId, PropertyMap,
    TaxonomyEntity, TaxonomyKind, TrackerRecord, TrackerState,
};

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// Record of a board operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardCall {
    ListPages,
    GetPage(PageId),
    CreatePage(PropertyMap),
    UpdatePage(PageId, PropertyMap),
}

#[derive(Debug, Default)]
struct BoardState {
    /// Pages of the synced database.
    pages: Vec<BoardPage>,
    /// Pages reachable only through relations.
    related: Vec<BoardPage>,
    next_id: u64,
    calls: Vec<BoardCall>,
    failing_updates: HashSet<PageId>,
    fail_listing: bool,
}

impl BoardState {
    fn find_mut(&mut self, id: &PageId) -> Option<&mut BoardPage> {
        self.pages
            .iter_mut()
            .chain(self.related.iter_mut())
            .find(|page| &page.id == id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBoard {
    state: Mutex<BoardState>,
}

impl InMemoryBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: impl IntoIterator<Item = BoardPage>) -> Self {
        let board = Self::new();
        board.state().pages.extend(pages);
        board
    }

    /// Adds a page that `get_page` can see but `list_pages` does not return.
    pub fn insert_related(&self, page: BoardPage) {
        self.state().related.push(page);
    }

    pub fn pages(&self) -> Vec<BoardPage> {
        self.state().pages.clone()
    }

    pub fn page(&self, id: &PageId) -> Option<BoardPage> {
        self.state().find_mut(id).map(|page| page.clone())
    }

    pub fn calls(&self) -> Vec<BoardCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn fail_updates_for(&self, id: impl Into<PageId>) {
        self.state().failing_updates.insert(id.into());
    }

    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    fn state(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BoardStore for InMemoryBoard {
    async fn list_pages(&self) -> Result<Vec<BoardPage>, StoreError> {
        let mut state = self.state();
        state.calls.push(BoardCall::ListPages);
        if state.fail_listing {
            return Err(StoreError::Transport("board listing disabled".into()));
        }
        Ok(state.pages.clone())
    }

    async fn get_page(&self, id: &PageId) -> Result<BoardPage, StoreError> {
        let mut state = self.state();
        state.calls.push(BoardCall::GetPage(id.clone()));
        state
            .find_mut(id)
            .map(|page| page.clone())
            .ok_or_else(|| StoreError::NotFound {
                what: format!("page {id}"),
            })
    }

    async fn create_page(&self, properties: PropertyMap) -> Result<BoardPage, StoreError> {
        let mut state = self.state();
        state.calls.push(BoardCall::CreatePage(properties.clone()));
        state.next_id += 1;
        let page = BoardPage::new(format!("page-{}", state.next_id), properties);
        state.pages.push(page.clone());
        Ok(page)
    }

    async fn update_page(&self, id: &PageId, properties: PropertyMap) -> Result<(), StoreError> {
        let mut state = self.state();
        state
            .calls
            .push(BoardCall::UpdatePage(id.clone(), properties.clone()));
        if state.failing_updates.contains(id) {
            return Err(StoreError::Http {
                status: 500,
                body: format!("update of {id} rejected"),
            });
        }
        let page = state.find_mut(id).ok_or_else(|| StoreError::NotFound {
            what: format!("page {id}"),
        })?;
        page.properties.extend(properties);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Record of a tracker operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerCall {
    ListRecords,
    CreateRecord(NewTrackerRecord),
    DeleteRecord(IssueNumber),
    ListTaxonomy,
    CreateTaxonomy(TaxonomyKind, String),
}

#[derive(Debug, Default)]
struct TrackerData {
    records: Vec<TrackerRecord>,
    taxonomy: Vec<TaxonomyEntity>,
    next_number: u64,
    next_label_id: u64,
    next_milestone: u64,
    calls: Vec<TrackerCall>,
    failing_titles: HashSet<String>,
    failing_taxonomy: HashSet<String>,
    racing_taxonomy: HashSet<String>,
    fail_listing: bool,
    fail_taxonomy_listing: bool,
}

impl TrackerData {
    fn insert_entity(&mut self, kind: TaxonomyKind, name: &str) -> TaxonomyEntity {
        let id = if kind.is_label() {
            self.next_label_id += 1;
            self.next_label_id
        } else {
            self.next_milestone += 1;
            self.next_milestone
        };
        let entity = TaxonomyEntity::new(kind, name, Some(id));
        self.taxonomy.push(entity.clone());
        entity
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTracker {
    state: Mutex<TrackerData>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = TrackerRecord>) -> Self {
        let tracker = Self::new();
        {
            let mut state = tracker.state();
            state.records.extend(records);
            state.next_number = state
                .records
                .iter()
                .map(|record| record.number.0)
                .max()
                .unwrap_or(0);
        }
        tracker
    }

    /// Seeds an existing entity; ids are assigned like a real create.
    pub fn insert_taxonomy(&self, kind: TaxonomyKind, name: &str) -> TaxonomyEntity {
        self.state().insert_entity(kind, name)
    }

    pub fn records(&self) -> Vec<TrackerRecord> {
        self.state().records.clone()
    }

    pub fn taxonomy(&self) -> Vec<TaxonomyEntity> {
        self.state().taxonomy.clone()
    }

    pub fn calls(&self) -> Vec<TrackerCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn fail_create_for_title(&self, title: impl Into<String>) {
        self.state().failing_titles.insert(title.into());
    }

    pub fn fail_taxonomy_for(&self, kind: TaxonomyKind, name: &str) {
        self.state()
            .failing_taxonomy
            .insert(composite_name(kind, name));
    }

    /// Simulates a concurrent creator: the entity appears on the tracker and
    /// the create call reports [`StoreError::AlreadyExists`].
    pub fn race_taxonomy_for(&self, kind: TaxonomyKind, name: &str) {
        self.state()
            .racing_taxonomy
            .insert(composite_name(kind, name));
    }

    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    pub fn fail_taxonomy_listing(&self) {
        self.state().fail_taxonomy_listing = true;
    }

    fn state(&self) -> MutexGuard<'_, TrackerData> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TrackerStore for InMemoryTracker {
    async fn list_records(&self) -> Result<Vec<TrackerRecord>, StoreError> {
        let mut state = self.state();
        state.calls.push(TrackerCall::ListRecords);
        if state.fail_listing {
            return Err(StoreError::Http {
                status: 401,
                body: "bad credentials".into(),
            });
        }
        Ok(state.records.clone())
    }

    async fn create_record(&self, record: NewTrackerRecord) -> Result<TrackerRecord, StoreError> {
        let mut state = self.state();
        state.calls.push(TrackerCall::CreateRecord(record.clone()));
        if state.failing_titles.contains(&record.title) {
            return Err(StoreError::Http {
                status: 502,
                body: format!("create of '{}' rejected", record.title),
            });
        }
        state.next_number += 1;
        let number = state.next_number;
        let created = TrackerRecord {
            number: IssueNumber(number),
            title: record.title,
            state: TrackerState::Open,
            comment_count: 0,
            url: Some(format!("https://tracker.invalid/issues/{number}")),
            labels: record.labels,
            milestone: record.milestone,
        };
        state.records.push(created.clone());
        Ok(created)
    }

    async fn delete_record(&self, number: IssueNumber) -> Result<(), StoreError> {
        let mut state = self.state();
        state.calls.push(TrackerCall::DeleteRecord(number));
        let before = state.records.len();
        state.records.retain(|record| record.number != number);
        if state.records.len() == before {
            return Err(StoreError::NotFound {
                what: format!("record {number}"),
            });
        }
        Ok(())
    }

    async fn list_taxonomy(&self) -> Result<Vec<TaxonomyEntity>, StoreError> {
        let mut state = self.state();
        state.calls.push(TrackerCall::ListTaxonomy);
        if state.fail_taxonomy_listing {
            return Err(StoreError::Http {
                status: 503,
                body: "taxonomy unavailable".into(),
            });
        }
        Ok(state.taxonomy.clone())
    }

    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<TaxonomyEntity, StoreError> {
        let mut state = self.state();
        state
            .calls
            .push(TrackerCall::CreateTaxonomy(kind, name.to_owned()));
        let key = composite_name(kind, name);
        if state.failing_taxonomy.contains(&key) {
            return Err(StoreError::Http {
                status: 500,
                body: format!("create of {key} rejected"),
            });
        }
        let exists = state
            .taxonomy
            .iter()
            .any(|entity| entity.kind == kind && entity.name == name);
        if exists {
            return Err(StoreError::AlreadyExists { what: key });
        }
        if state.racing_taxonomy.remove(&key) {
            state.insert_entity(kind, name);
            return Err(StoreError::AlreadyExists { what: key });
        }
        Ok(state.insert_entity(kind, name))
    }
}
