//! Get-or-create resolution of board relations into tracker labels and
//! milestones.
//!
//! One resolver lives for one run. It loads the tracker's taxonomy up front
//! and memoizes both the entities and the related board pages it reads, so
//! each distinct `(kind, name)` costs at most one creation per run.
//!
//! Resolution mutates the cache and writes milestone links back to the
//! board, so callers drive it sequentially through `&mut self`.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use boardsync_core::types::composite_name;
use boardsync_core::{
    BoardStore, PageId, StoreError, TaxonomyEntity, TaxonomyKind, TrackerStore,
};

use crate::error::{Stage, SyncError};
use crate::mapper::{PageView, PropertyMapper};

/// Tracker-side classification for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedTaxonomy {
    /// Composite label names (`"{kind}/{name}"`), deduplicated.
    pub labels: Vec<String>,
    pub milestone: Option<u64>,
}

/// A relation that could not be turned into a tracker entity. The page is
/// still created, just without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomyFailure {
    pub page: PageId,
    pub kind: TaxonomyKind,
    pub related: PageId,
    pub name: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone)]
struct RelatedPage {
    name: Option<String>,
    milestone: Option<u64>,
}

pub struct TaxonomyResolver<'a> {
    board: &'a dyn BoardStore,
    tracker: &'a dyn TrackerStore,
    mapper: PropertyMapper<'a>,
    cache: HashMap<String, TaxonomyEntity>,
    pages: HashMap<PageId, RelatedPage>,
    created: usize,
    failures: Vec<TaxonomyFailure>,
}

impl<'a> TaxonomyResolver<'a> {
    pub fn new(
        board: &'a dyn BoardStore,
        tracker: &'a dyn TrackerStore,
        mapper: PropertyMapper<'a>,
    ) -> Self {
        Self {
            board,
            tracker,
            mapper,
            cache: HashMap::new(),
            pages: HashMap::new(),
            created: 0,
            failures: Vec::new(),
        }
    }

    /// Fill the cache with every existing entity of every kind, in one
    /// listing.
    ///
    /// A listing failure here is fatal for the run: without it the resolver
    /// cannot tell a miss from an outage and would create duplicates.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        let entities = self
            .tracker
            .list_taxonomy()
            .await
            .map_err(SyncError::stage(Stage::ListTaxonomy))?;
        self.remember(entities);
        tracing::debug!(entries = self.cache.len(), "taxonomy cache loaded");
        Ok(())
    }

    /// Entities created on the tracker so far.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn failures(&self) -> &[TaxonomyFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TaxonomyFailure> {
        self.failures
    }

    /// Labels and milestone for one unlinked page. Never fails; entities that
    /// cannot be resolved are left out and recorded in [`Self::failures`].
    pub async fn resolve(&mut self, page: &PageView) -> ResolvedTaxonomy {
        let mut resolved = ResolvedTaxonomy::default();

        for (kind, related) in page.relations.labelled() {
            if let Some(label) = self.resolve_label(&page.id, kind, related).await {
                if !resolved.labels.contains(&label) {
                    resolved.labels.push(label);
                }
            }
        }

        if let Some(related) = &page.relations.milestone {
            resolved.milestone = self.resolve_milestone(&page.id, related).await;
        }

        resolved
    }

    async fn resolve_label(
        &mut self,
        page: &PageId,
        kind: TaxonomyKind,
        related: &PageId,
    ) -> Option<String> {
        let name = self.related_name(page, kind, related).await?;
        match self.get_or_create(kind, &name).await {
            Ok(entity) => Some(entity.composite_name()),
            Err(err) => {
                self.fail(page, kind, related, Some(name), err);
                None
            }
        }
    }

    async fn resolve_milestone(&mut self, page: &PageId, related: &PageId) -> Option<u64> {
        let kind = TaxonomyKind::Milestone;
        let info = match self.related_page(related).await {
            Ok(info) => info,
            Err(err) => {
                self.fail(page, kind, related, None, err);
                return None;
            }
        };
        if let Some(number) = info.milestone {
            return Some(number);
        }
        let Some(name) = info.name.filter(|name| !name.is_empty()) else {
            self.fail(page, kind, related, None, "related page has no title");
            return None;
        };

        let entity = match self.get_or_create(kind, &name).await {
            Ok(entity) => entity,
            Err(err) => {
                self.fail(page, kind, related, Some(name), err);
                return None;
            }
        };
        let Some(number) = entity.tracker_id else {
            self.fail(page, kind, related, Some(name), "tracker returned no milestone number");
            return None;
        };

        // Link the milestone page now so later runs and later pages in this
        // run reuse the number instead of looking it up by name.
        let link = self.mapper.milestone_link_properties(number);
        match self.board.update_page(related, link).await {
            Ok(()) => tracing::info!(milestone = %related, number, "linked milestone page"),
            Err(err) => self.fail(page, kind, related, Some(name), err),
        }
        if let Some(memo) = self.pages.get_mut(related) {
            memo.milestone = Some(number);
        }
        Some(number)
    }

    async fn related_name(
        &mut self,
        page: &PageId,
        kind: TaxonomyKind,
        related: &PageId,
    ) -> Option<String> {
        match self.related_page(related).await {
            Ok(RelatedPage {
                name: Some(name), ..
            }) if !name.is_empty() => Some(name),
            Ok(_) => {
                self.fail(page, kind, related, None, "related page has no title");
                None
            }
            Err(err) => {
                self.fail(page, kind, related, None, err);
                None
            }
        }
    }

    async fn related_page(&mut self, id: &PageId) -> Result<RelatedPage, StoreError> {
        if let Some(memo) = self.pages.get(id) {
            return Ok(memo.clone());
        }
        let page = self.board.get_page(id).await?;
        let memo = RelatedPage {
            name: page.display_name(),
            milestone: self.mapper.milestone_link(&page),
        };
        self.pages.insert(id.clone(), memo.clone());
        Ok(memo)
    }

    async fn get_or_create(
        &mut self,
        kind: TaxonomyKind,
        name: &str,
    ) -> Result<TaxonomyEntity, StoreError> {
        let key = composite_name(kind, name);
        if let Some(entity) = self.cache.get(&key) {
            return Ok(entity.clone());
        }

        let entity = match self.tracker.create_taxonomy(kind, name).await {
            Ok(entity) => {
                self.created += 1;
                tracing::info!(entity = %key, "created tracker taxonomy entity");
                entity
            }
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(entity = %key, "entity already on tracker, re-listing");
                let existing = self.tracker.list_taxonomy().await?;
                self.remember(existing);
                self.cache
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| StoreError::NotFound { what: key.clone() })?
            }
            Err(err) => return Err(err),
        };

        self.cache.insert(key, entity.clone());
        Ok(entity)
    }

    fn remember(&mut self, entities: Vec<TaxonomyEntity>) {
        for entity in entities {
            self.cache.insert(entity.composite_name(), entity);
        }
    }

    fn fail(
        &mut self,
        page: &PageId,
        kind: TaxonomyKind,
        related: &PageId,
        name: Option<String>,
        error: impl fmt::Display,
    ) {
        let error = error.to_string();
        tracing::warn!(
            page = %page,
            kind = %kind,
            related = %related,
            error = %error,
            "taxonomy entity unresolved, continuing without it"
        );
        self.failures.push(TaxonomyFailure {
            page: page.clone(),
            kind,
            related: related.clone(),
            name,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use boardsync_core::memory::{BoardCall, InMemoryBoard, InMemoryTracker, TrackerCall};
    use boardsync_core::types::UNLINKED;
    use boardsync_core::{BoardPage, BoardSchema, PropertyMap, PropertyValue};

    use crate::mapper::PageRelations;

    use super::*;

    fn titled(id: &str, title: &str) -> BoardPage {
        let mut properties = PropertyMap::new();
        properties.insert("Name".into(), PropertyValue::title(title));
        BoardPage::new(id, properties)
    }

    fn milestone_page(id: &str, title: &str, number: i64) -> BoardPage {
        let mut page = titled(id, title);
        page.properties.insert(
            "Milestone Number".into(),
            PropertyValue::Number(Some(number)),
        );
        page
    }

    fn unlinked(id: &str, relations: PageRelations) -> PageView {
        PageView {
            id: PageId::from(id),
            cross_ref: None,
            title: vec![id.to_owned()],
            status: None,
            relations,
        }
    }

    fn creations(tracker: &InMemoryTracker) -> usize {
        tracker
            .calls()
            .iter()
            .filter(|call| matches!(call, TrackerCall::CreateTaxonomy(..)))
            .count()
    }

    #[tokio::test]
    async fn cached_entity_is_reused_without_creation() {
        let board = InMemoryBoard::new();
        board.insert_related(titled("f1", "Auth"));
        let tracker = InMemoryTracker::new();
        tracker.insert_taxonomy(TaxonomyKind::Feature, "Auth");
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    feature: vec!["f1".into()],
                    ..PageRelations::default()
                },
            ))
            .await;

        assert_eq!(resolved.labels, vec!["feature/Auth".to_string()]);
        assert_eq!(creations(&tracker), 0);
        assert_eq!(resolver.created(), 0);
    }

    #[tokio::test]
    async fn load_lists_taxonomy_once() {
        let board = InMemoryBoard::new();
        let tracker = InMemoryTracker::new();
        tracker.insert_taxonomy(TaxonomyKind::Feature, "Auth");
        tracker.insert_taxonomy(TaxonomyKind::Milestone, "v1.0");
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");

        let listings = tracker
            .calls()
            .iter()
            .filter(|call| matches!(call, TrackerCall::ListTaxonomy))
            .count();
        assert_eq!(listings, 1);
        assert_eq!(resolver.cache.len(), 2);
    }

    #[tokio::test]
    async fn same_entity_twice_is_created_once() {
        let board = InMemoryBoard::new();
        board.insert_related(titled("hi", "High"));
        let tracker = InMemoryTracker::new();
        let schema = BoardSchema::default();
        let relations = PageRelations {
            priority: Some("hi".into()),
            ..PageRelations::default()
        };

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let first = resolver.resolve(&unlinked("p1", relations.clone())).await;
        let second = resolver.resolve(&unlinked("p2", relations)).await;

        assert_eq!(first, second);
        assert_eq!(first.labels, vec!["priority/High".to_string()]);
        assert_eq!(creations(&tracker), 1);
        assert_eq!(resolver.created(), 1);
        // The related page is read once.
        let reads = board
            .calls()
            .iter()
            .filter(|call| matches!(call, BoardCall::GetPage(_)))
            .count();
        assert_eq!(reads, 1);
    }

    #[tokio::test]
    async fn concurrent_creation_is_treated_as_success() {
        let board = InMemoryBoard::new();
        board.insert_related(titled("t1", "Bug"));
        let tracker = InMemoryTracker::new();
        tracker.race_taxonomy_for(TaxonomyKind::EntryType, "Bug");
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    entry_type: Some("t1".into()),
                    ..PageRelations::default()
                },
            ))
            .await;

        assert_eq!(resolved.labels, vec!["type/Bug".to_string()]);
        assert!(resolver.failures().is_empty());
        assert_eq!(tracker.taxonomy().len(), 1);
    }

    #[tokio::test]
    async fn failed_entity_degrades_to_absent() {
        let board = InMemoryBoard::new();
        board.insert_related(titled("f1", "Auth"));
        board.insert_related(titled("pt", "3"));
        let tracker = InMemoryTracker::new();
        tracker.fail_taxonomy_for(TaxonomyKind::Feature, "Auth");
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    feature: vec!["f1".into()],
                    points: Some("pt".into()),
                    ..PageRelations::default()
                },
            ))
            .await;

        assert_eq!(resolved.labels, vec!["points/3".to_string()]);
        assert_eq!(resolver.failures().len(), 1);
        let failure = &resolver.failures()[0];
        assert_eq!(failure.kind, TaxonomyKind::Feature);
        assert_eq!(failure.name.as_deref(), Some("Auth"));
    }

    #[tokio::test]
    async fn missing_related_page_is_recorded() {
        let board = InMemoryBoard::new();
        let tracker = InMemoryTracker::new();
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    feature: vec!["gone".into()],
                    ..PageRelations::default()
                },
            ))
            .await;

        assert!(resolved.labels.is_empty());
        assert_eq!(resolver.into_failures()[0].related, PageId::from("gone"));
    }

    #[tokio::test]
    async fn unlinked_milestone_is_created_and_written_back() {
        let board = InMemoryBoard::new();
        board.insert_related(milestone_page("m1", "v1.0", UNLINKED));
        let tracker = InMemoryTracker::new();
        let schema = BoardSchema::default();
        let relations = PageRelations {
            milestone: Some("m1".into()),
            ..PageRelations::default()
        };

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let first = resolver.resolve(&unlinked("p1", relations.clone())).await;
        let second = resolver.resolve(&unlinked("p2", relations)).await;

        assert_eq!(first.milestone, Some(1));
        assert_eq!(second.milestone, Some(1));
        assert_eq!(creations(&tracker), 1);

        let page = board.page(&PageId::from("m1")).expect("milestone page");
        assert_eq!(
            page.property("Milestone Number"),
            Some(&PropertyValue::Number(Some(1)))
        );
        let writes = board
            .calls()
            .iter()
            .filter(|call| matches!(call, BoardCall::UpdatePage(..)))
            .count();
        assert_eq!(writes, 1);
    }

    #[tokio::test]
    async fn linked_milestone_reuses_stored_number() {
        let board = InMemoryBoard::new();
        board.insert_related(milestone_page("m1", "v2.0", 4));
        let tracker = InMemoryTracker::new();
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    milestone: Some("m1".into()),
                    ..PageRelations::default()
                },
            ))
            .await;

        assert_eq!(resolved.milestone, Some(4));
        assert_eq!(creations(&tracker), 0);
    }

    #[tokio::test]
    async fn failed_write_back_still_uses_milestone() {
        let board = InMemoryBoard::new();
        board.insert_related(milestone_page("m1", "v1.0", UNLINKED));
        board.fail_updates_for("m1");
        let tracker = InMemoryTracker::new();
        let schema = BoardSchema::default();

        let mut resolver = TaxonomyResolver::new(&board, &tracker, PropertyMapper::new(&schema));
        resolver.load().await.expect("load");
        let resolved = resolver
            .resolve(&unlinked(
                "p1",
                PageRelations {
                    milestone: Some("m1".into()),
                    ..PageRelations::default()
                },
            ))
            .await;

        assert_eq!(resolved.milestone, Some(1));
        assert_eq!(resolver.failures().len(), 1);
        assert_eq!(resolver.failures()[0].kind, TaxonomyKind::Milestone);
    }
}
