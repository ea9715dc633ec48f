//! boardsync core library: domain types, store interfaces, configuration.
//!
//! - [`types`]: board pages, tracker records, taxonomy entities
//! - [`store`]: the [`BoardStore`] / [`TrackerStore`] capability traits
//! - `memory`: call-recording in-memory stores (`test-utils` feature)
//! - [`config`]: `~/.boardsync/config.yaml` load / save / env overrides
//! - [`error`]: [`StoreError`], [`ConfigError`]

pub mod config;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod store;
pub mod types;

pub use config::{BoardSchema, StatusColumn, SyncConfig};
pub use error::{ConfigError, StoreError};
pub use store::{BoardStore, TrackerStore};
pub use types::{
    BoardPage, IssueNumber, NewTrackerRecord, PageId, PropertyKind, PropertyMap, PropertyValue,
    TaxonomyEntity, TaxonomyKind, TrackerRecord, TrackerState,
};
