//! Capability interfaces the reconciliation engine calls through.
//!
//! Implementations own pagination, authentication and wire encoding. The
//! engine receives them as explicit handles; nothing here is global.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{
    BoardPage, IssueNumber, NewTrackerRecord, PageId, PropertyMap, TaxonomyEntity, TaxonomyKind,
    TrackerRecord,
};

/// The structured-page store.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Every page of the synced database, fully paginated.
    async fn list_pages(&self) -> Result<Vec<BoardPage>, StoreError>;

    /// A single page by id. Used for related pages that live outside the
    /// synced database (features, milestones, ...).
    async fn get_page(&self, id: &PageId) -> Result<BoardPage, StoreError>;

    async fn create_page(&self, properties: PropertyMap) -> Result<BoardPage, StoreError>;

    /// Overwrites the given properties; properties not named are untouched.
    async fn update_page(&self, id: &PageId, properties: PropertyMap) -> Result<(), StoreError>;
}

/// The issue-oriented store.
#[async_trait]
pub trait TrackerStore: Send + Sync {
    /// Every record, fully paginated. Pull-request-like entries are filtered
    /// out by the implementation.
    async fn list_records(&self) -> Result<Vec<TrackerRecord>, StoreError>;

    async fn create_record(&self, record: NewTrackerRecord) -> Result<TrackerRecord, StoreError>;

    async fn delete_record(&self, number: IssueNumber) -> Result<(), StoreError>;

    /// Existing entities of every kind, in one pass over the tracker. Label
    /// names are returned without the composite prefix.
    async fn list_taxonomy(&self) -> Result<Vec<TaxonomyEntity>, StoreError>;

    /// Creates one entity. Returns [`StoreError::AlreadyExists`] when the
    /// tracker already holds an entity with that name.
    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<TaxonomyEntity, StoreError>;
}
