//! Translation between tracker records and the board property schema.
//!
//! Everything here is pure and deterministic. [`PropertyMapper::page_view`]
//! is the only place board property kinds are checked; the rest of the
//! engine works on the validated [`PageView`].

use serde::Serialize;

use boardsync_core::{
    BoardPage, BoardSchema, IssueNumber, NewTrackerRecord, PageId, PropertyKind, PropertyMap,
    PropertyValue, StatusColumn, TaxonomyKind, TrackerRecord, TrackerState,
};

use crate::error::MappingError;
use crate::taxonomy::ResolvedTaxonomy;

// ---------------------------------------------------------------------------
// Validated page view
// ---------------------------------------------------------------------------

/// Classification relations of a board page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PageRelations {
    pub feature: Vec<PageId>,
    pub entry_type: Option<PageId>,
    pub priority: Option<PageId>,
    pub points: Option<PageId>,
    pub milestone: Option<PageId>,
}

impl PageRelations {
    /// Label-producing relations, in resolution order.
    pub fn labelled(&self) -> Vec<(TaxonomyKind, &PageId)> {
        let mut out: Vec<(TaxonomyKind, &PageId)> = self
            .feature
            .iter()
            .map(|id| (TaxonomyKind::Feature, id))
            .collect();
        out.extend(self.entry_type.iter().map(|id| (TaxonomyKind::EntryType, id)));
        out.extend(self.priority.iter().map(|id| (TaxonomyKind::Priority, id)));
        out.extend(self.points.iter().map(|id| (TaxonomyKind::Points, id)));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.feature.is_empty()
            && self.entry_type.is_none()
            && self.priority.is_none()
            && self.points.is_none()
            && self.milestone.is_none()
    }
}

/// A board page after schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub id: PageId,
    /// `None` when the page is not linked to a tracker record yet.
    pub cross_ref: Option<IssueNumber>,
    /// Rich-text title segments, in order.
    pub title: Vec<String>,
    pub status: Option<String>,
    pub relations: PageRelations,
}

impl PageView {
    pub fn title_text(&self) -> String {
        self.title.concat()
    }

    pub fn is_unlinked(&self) -> bool {
        self.cross_ref.is_none()
    }
}

// ---------------------------------------------------------------------------
// Mapper
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct PropertyMapper<'a> {
    schema: &'a BoardSchema,
}

impl<'a> PropertyMapper<'a> {
    pub fn new(schema: &'a BoardSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &'a BoardSchema {
        self.schema
    }

    /// Two buckets only: `open` and everything else.
    pub fn status_for(&self, state: &TrackerState) -> &'a str {
        if state.is_open() {
            &self.schema.open_status
        } else {
            &self.schema.closed_status
        }
    }

    /// Status bucket for `state` in the shape of the configured column.
    pub fn status_value(&self, state: &TrackerState) -> PropertyValue {
        let name = Some(self.status_for(state).to_owned());
        match self.schema.status_column {
            StatusColumn::Select => PropertyValue::Select(name),
            StatusColumn::Status => PropertyValue::Status(name),
        }
    }

    /// Full property set for a board page mirroring `record`. Used for new
    /// pages and for updates of linked ones.
    pub fn record_properties(&self, record: &TrackerRecord) -> PropertyMap {
        let mut properties = self.link_properties(record);
        properties.insert(
            self.schema.title.clone(),
            PropertyValue::title(record.title.clone()),
        );
        properties
    }

    /// Everything the tracker owns except the title: cross-ref, status and
    /// the derived fields the schema carries. Written back to a page right
    /// after its tracker record was created from it.
    pub fn link_properties(&self, record: &TrackerRecord) -> PropertyMap {
        let mut properties = PropertyMap::new();
        properties.insert(
            self.schema.cross_ref.clone(),
            PropertyValue::Number(Some(record.number.to_board_number())),
        );
        properties.insert(self.schema.status.clone(), self.status_value(&record.state));
        if let Some(name) = &self.schema.comment_count {
            let count = i64::try_from(record.comment_count).unwrap_or(i64::MAX);
            properties.insert(name.clone(), PropertyValue::Number(Some(count)));
        }
        if let Some(name) = &self.schema.url {
            properties.insert(name.clone(), PropertyValue::Url(record.url.clone()));
        }
        properties
    }

    /// Tracker creation payload for an unlinked page.
    pub fn creation_payload(&self, view: &PageView, taxonomy: ResolvedTaxonomy) -> NewTrackerRecord {
        NewTrackerRecord {
            title: view.title_text(),
            labels: taxonomy.labels,
            milestone: taxonomy.milestone,
        }
    }

    /// Tracker milestone number stored on a milestone page, if any.
    ///
    /// Lenient on purpose: anything but a non-negative number reads as
    /// unlinked.
    pub fn milestone_link(&self, page: &BoardPage) -> Option<u64> {
        match page.property(&self.schema.milestone_number) {
            Some(PropertyValue::Number(raw)) => IssueNumber::from_board_number(*raw).map(|n| n.0),
            _ => None,
        }
    }

    /// Cross-ref of a page that failed validation, when its key property is
    /// still readable. Such pages stay indexed so their record is not
    /// mirrored onto the board a second time.
    pub fn salvage_cross_ref(&self, page: &BoardPage) -> Option<IssueNumber> {
        match page.property(&self.schema.cross_ref) {
            Some(PropertyValue::Number(raw)) => IssueNumber::from_board_number(*raw),
            _ => None,
        }
    }

    pub fn milestone_link_properties(&self, number: u64) -> PropertyMap {
        let mut properties = PropertyMap::new();
        properties.insert(
            self.schema.milestone_number.clone(),
            PropertyValue::Number(Some(IssueNumber(number).to_board_number())),
        );
        properties
    }

    /// Validate a board page against the schema.
    ///
    /// The title must be present. Every other property may be absent; a
    /// present property of the wrong kind is an error.
    pub fn page_view(&self, page: &BoardPage) -> Result<PageView, MappingError> {
        let schema = self.schema;

        let title = match typed(page, &schema.title, PropertyKind::Title)? {
            Some(PropertyValue::Title(segments)) => segments.clone(),
            _ => {
                return Err(MappingError::MissingProperty {
                    page: page.id.clone(),
                    property: schema.title.clone(),
                })
            }
        };

        let cross_ref = match typed(page, &schema.cross_ref, PropertyKind::Number)? {
            Some(PropertyValue::Number(raw)) => IssueNumber::from_board_number(*raw),
            _ => None,
        };

        let status = match page.property(&schema.status) {
            None => None,
            Some(PropertyValue::Select(name) | PropertyValue::Status(name)) => name.clone(),
            Some(other) => {
                return Err(MappingError::WrongKind {
                    page: page.id.clone(),
                    property: schema.status.clone(),
                    expected: match schema.status_column {
                        StatusColumn::Select => PropertyKind::Select,
                        StatusColumn::Status => PropertyKind::Status,
                    },
                    found: other.kind(),
                })
            }
        };

        let relations = PageRelations {
            feature: relation(page, &schema.feature)?,
            entry_type: single_relation(page, &schema.entry_type)?,
            priority: single_relation(page, &schema.priority)?,
            points: single_relation(page, &schema.points)?,
            milestone: single_relation(page, &schema.milestone)?,
        };

        Ok(PageView {
            id: page.id.clone(),
            cross_ref,
            title,
            status,
            relations,
        })
    }
}

fn typed<'p>(
    page: &'p BoardPage,
    property: &str,
    expected: PropertyKind,
) -> Result<Option<&'p PropertyValue>, MappingError> {
    match page.property(property) {
        None => Ok(None),
        Some(value) if value.kind() == expected => Ok(Some(value)),
        Some(value) => Err(MappingError::WrongKind {
            page: page.id.clone(),
            property: property.to_owned(),
            expected,
            found: value.kind(),
        }),
    }
}

fn relation(page: &BoardPage, property: &str) -> Result<Vec<PageId>, MappingError> {
    match typed(page, property, PropertyKind::Relation)? {
        Some(PropertyValue::Relation(ids)) => Ok(ids.clone()),
        _ => Ok(Vec::new()),
    }
}

/// Single-valued relations keep the first related page only.
fn single_relation(page: &BoardPage, property: &str) -> Result<Option<PageId>, MappingError> {
    Ok(relation(page, property)?.into_iter().next())
}
