//! # boardsync-clients
//!
//! HTTP implementations of [`boardsync_core::BoardStore`] (Notion) and
//! [`boardsync_core::TrackerStore`] (GitHub issues).
//!
//! Requests go through blocking `ureq` agents run on tokio's blocking pool;
//! [`http::HttpClient`] owns retries on rate limits.

pub mod github;
pub mod http;
pub mod notion;

pub use github::GithubTracker;
pub use http::HttpClient;
pub use notion::NotionBoard;
