//! # boardsync-sync
//!
//! Reconciliation engine between a tracker and a board.
//!
//! Call [`run`] for a full pass, or [`plan`] to see what a pass would do
//! without writing. [`prune_below`] is the tracker maintenance helper.
//! Stores are passed in as `&dyn` handles; see [`boardsync_core::store`].

pub mod batch;
pub mod error;
pub mod mapper;
pub mod matcher;
pub mod pipeline;
pub mod prune;
pub mod reconcile;
pub mod report;
pub mod taxonomy;

pub use batch::{apply_in_groups, ApplyAction, ApplyFailure, ApplyOutcome};
pub use error::{MappingError, Stage, SyncError};
pub use mapper::{PageRelations, PageView, PropertyMapper};
pub use matcher::{build_index, CrossRefIndex, DuplicateKey};
pub use pipeline::{plan, run, Plan, RunOptions};
pub use prune::{prune_below, PruneReport};
pub use reconcile::{reconcile, ActionCounts, ActionSet, BoardUpdate};
pub use report::{InvalidPage, RunReport};
pub use taxonomy::{ResolvedTaxonomy, TaxonomyFailure, TaxonomyResolver};
