//! Error types for boardsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a [`BoardStore`](crate::store::BoardStore) or
/// [`TrackerStore`](crate::store::TrackerStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The remote answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote asked us to slow down and retries were exhausted.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// A create call collided with an entity that already exists.
    #[error("already exists: {what}")]
    AlreadyExists { what: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    /// The response body did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// All errors that can arise while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}; run `boardsync init` first")]
    NotFound { path: PathBuf },

    /// A required field is empty after file and environment were merged.
    #[error("missing required config field `{field}`")]
    Missing { field: &'static str },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
