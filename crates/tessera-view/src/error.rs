//! Error types for tessera-view.

use thiserror::Error;

/// Result type for surface operations.
pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Errors raised while bringing up or driving the render surface.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    /// The host reported a surface with no drawable area.
    #[error("surface has no drawable area ({width}x{height})")]
    ZeroSize { width: f64, height: f64 },

    /// The host failed to create the surface.
    #[error("surface host failed: {0}")]
    HostFailure(String),

    /// The controller was disposed.
    #[error("viewport disposed")]
    Disposed,
}
