//! Domain types shared by the store clients and the reconciliation engine.
//!
//! Board pages carry a loosely typed property bag ([`PropertyMap`]); the
//! sync engine validates it into a typed view at a single boundary.
//! Tracker records are already typed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Store-assigned identifier of a board page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub String);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Tracker record number. Doubles as the cross-ref key stored on the board.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IssueNumber(pub u64);

/// Board-side number meaning "not yet linked to a tracker record".
pub const UNLINKED: i64 = -1;

impl IssueNumber {
    /// Interpret a board number property as a cross-ref key.
    ///
    /// An empty property and any negative value (the [`UNLINKED`] sentinel)
    /// both mean the page has no tracker counterpart yet.
    pub fn from_board_number(value: Option<i64>) -> Option<Self> {
        match value {
            Some(n) if n >= 0 => Some(Self(n as u64)),
            _ => None,
        }
    }

    pub fn to_board_number(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for IssueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for IssueNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Board properties
// ---------------------------------------------------------------------------

/// One typed board property value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// Rich-text title, one entry per segment.
    Title(Vec<String>),
    /// Rich-text body, one entry per segment.
    Text(Vec<String>),
    Number(Option<i64>),
    Select(Option<String>),
    /// Notion's workflow `status` column: a select with its own wire shape.
    Status(Option<String>),
    Relation(Vec<PageId>),
    Url(Option<String>),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Title(_) => PropertyKind::Title,
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Select(_) => PropertyKind::Select,
            PropertyValue::Status(_) => PropertyKind::Status,
            PropertyValue::Relation(_) => PropertyKind::Relation,
            PropertyValue::Url(_) => PropertyKind::Url,
        }
    }

    /// Single-segment title, the shape written for new pages.
    pub fn title(text: impl Into<String>) -> Self {
        PropertyValue::Title(vec![text.into()])
    }
}

/// Discriminant of [`PropertyValue`], used in validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Title,
    Text,
    Number,
    Select,
    Status,
    Relation,
    Url,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Title => "title",
            PropertyKind::Text => "rich_text",
            PropertyKind::Number => "number",
            PropertyKind::Select => "select",
            PropertyKind::Status => "status",
            PropertyKind::Relation => "relation",
            PropertyKind::Url => "url",
        };
        f.write_str(name)
    }
}

/// Property name → value. Ordered so that payloads serialize deterministically.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A board page as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardPage {
    pub id: PageId,
    #[serde(default)]
    pub properties: PropertyMap,
}

impl BoardPage {
    pub fn new(id: impl Into<PageId>, properties: PropertyMap) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Concatenated text of the first title-kind property, whatever its name.
    pub fn display_name(&self) -> Option<String> {
        self.properties.values().find_map(|value| match value {
            PropertyValue::Title(segments) => Some(segments.concat()),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tracker records
// ---------------------------------------------------------------------------

/// Tracker record state. Only `open` is meaningful to the board mapping;
/// anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TrackerState {
    Open,
    Closed,
    Other(String),
}

impl TrackerState {
    pub fn is_open(&self) -> bool {
        matches!(self, TrackerState::Open)
    }

    pub fn as_str(&self) -> &str {
        match self {
            TrackerState::Open => "open",
            TrackerState::Closed => "closed",
            TrackerState::Other(other) => other,
        }
    }
}

impl From<&str> for TrackerState {
    fn from(s: &str) -> Self {
        match s {
            "open" => TrackerState::Open,
            "closed" => TrackerState::Closed,
            other => TrackerState::Other(other.to_owned()),
        }
    }
}

impl From<String> for TrackerState {
    fn from(s: String) -> Self {
        TrackerState::from(s.as_str())
    }
}

impl From<TrackerState> for String {
    fn from(state: TrackerState) -> Self {
        state.as_str().to_owned()
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An issue-like record owned by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerRecord {
    pub number: IssueNumber,
    pub title: String,
    pub state: TrackerState,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

impl TrackerRecord {
    pub fn new(number: u64, title: impl Into<String>, state: TrackerState) -> Self {
        Self {
            number: IssueNumber(number),
            title: title.into(),
            state,
            comment_count: 0,
            url: None,
            labels: Vec::new(),
            milestone: None,
        }
    }
}

/// Payload for creating a tracker record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewTrackerRecord {
    pub title: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// `None` means the field is omitted from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milestone: Option<u64>,
}

// ---------------------------------------------------------------------------
// Taxonomy
// ---------------------------------------------------------------------------

/// Classification dimension a board relation maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Feature,
    EntryType,
    Priority,
    Points,
    Milestone,
}

impl TaxonomyKind {
    pub fn all() -> &'static [TaxonomyKind] {
        &[
            TaxonomyKind::Feature,
            TaxonomyKind::EntryType,
            TaxonomyKind::Priority,
            TaxonomyKind::Points,
            TaxonomyKind::Milestone,
        ]
    }

    /// Prefix used in composite names (`"{prefix}/{name}"`).
    pub fn as_str(self) -> &'static str {
        match self {
            TaxonomyKind::Feature => "feature",
            TaxonomyKind::EntryType => "type",
            TaxonomyKind::Priority => "priority",
            TaxonomyKind::Points => "points",
            TaxonomyKind::Milestone => "milestone",
        }
    }

    /// Everything except milestones is a tracker label.
    pub fn is_label(self) -> bool {
        !matches!(self, TaxonomyKind::Milestone)
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        TaxonomyKind::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == prefix)
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `"{kind}/{name}"`, the cache key and the tracker label text.
pub fn composite_name(kind: TaxonomyKind, name: &str) -> String {
    format!("{}/{}", kind.as_str(), name)
}

/// Inverse of [`composite_name`]. Returns `None` for labels outside the
/// managed prefixes.
pub fn split_composite_name(composite: &str) -> Option<(TaxonomyKind, &str)> {
    let (prefix, name) = composite.split_once('/')?;
    let kind = TaxonomyKind::from_prefix(prefix)?;
    if name.is_empty() {
        return None;
    }
    Some((kind, name))
}

/// A tracker-side label or milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyEntity {
    pub kind: TaxonomyKind,
    pub name: String,
    /// Label id or milestone number; `None` until the tracker assigned one.
    #[serde(default)]
    pub tracker_id: Option<u64>,
}

impl TaxonomyEntity {
    pub fn new(kind: TaxonomyKind, name: impl Into<String>, tracker_id: Option<u64>) -> Self {
        Self {
            kind,
            name: name.into(),
            tracker_id,
        }
    }

    pub fn composite_name(&self) -> String {
        composite_name(self.kind, &self.name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
