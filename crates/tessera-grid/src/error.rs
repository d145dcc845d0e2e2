//! Error types for tessera-grid.

use thiserror::Error;

use crate::CellId;

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when reading or mutating the grid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Cell id outside `[0, WIDTH * HEIGHT)`.
    #[error("cell {0} not found")]
    NotFound(CellId),

    /// Stake amount that is not a non-negative integer of base units.
    #[error("invalid stake amount: {0:?}")]
    InvalidAmount(String),

    /// Address that is not `0x` followed by 40 hex digits.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    /// Transaction hash that is not `0x`-prefixed hex.
    #[error("invalid transaction hash: {0:?}")]
    InvalidHash(String),

    /// Color wider than 24 bits.
    #[error("color {0:#x} does not fit in 24 bits")]
    InvalidColor(u64),
}
