//! Error types for tessera-ingest.

use thiserror::Error;

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while ingesting grid events.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Network or upstream failure while fetching a snapshot, history or summary.
    /// Surfaced to the host; never retried here.
    #[error("fetch failed: {0}")]
    TransientFetch(String),

    /// An event that could not be decoded or violates the schema.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The grid store rejected a batch.
    #[error("grid error: {0}")]
    Grid(#[from] tessera_grid::Error),
}

impl Error {
    pub(crate) fn malformed(what: impl std::fmt::Display) -> Self {
        Error::MalformedEvent(what.to_string())
    }
}
