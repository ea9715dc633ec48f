//! Error types for boardsync-sync.

use std::fmt;

use thiserror::Error;

use boardsync_core::{ConfigError, PageId, PropertyKind, StoreError};

/// Fetch stages whose failure aborts the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ListBoardPages,
    ListTrackerRecords,
    ListTaxonomy,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::ListBoardPages => "listing board pages",
            Stage::ListTrackerRecords => "listing tracker records",
            Stage::ListTaxonomy => "listing tracker taxonomy",
        };
        f.write_str(label)
    }
}

/// Run-level failures. Per-item failures never surface here; they are
/// collected in the run report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn stage(stage: Stage) -> impl FnOnce(StoreError) -> SyncError {
        move |source| SyncError::Stage { stage, source }
    }
}

/// A board page whose properties do not match the configured schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("page {page}: missing property '{property}'")]
    MissingProperty { page: PageId, property: String },

    #[error("page {page}: property '{property}' is {found}, expected {expected}")]
    WrongKind {
        page: PageId,
        property: String,
        expected: PropertyKind,
        found: PropertyKind,
    },
}
