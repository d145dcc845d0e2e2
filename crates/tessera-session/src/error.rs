//! Error types for tessera-session.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the session.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Grid(#[from] tessera_grid::Error),

    #[error(transparent)]
    Ingest(#[from] tessera_ingest::Error),

    #[error(transparent)]
    Surface(#[from] tessera_view::SurfaceError),

    /// The session stopped accepting messages.
    #[error("session inbox closed")]
    InboxClosed,

    /// A replay fixture could not be read or parsed.
    #[error("fixture error: {0}")]
    Fixture(String),
}
