//! Tessera Grid Store
//!
//! O(1)-addressable state for every cell of the shared 100×100 grid.
//!
//! # Model
//!
//! Each cell carries a color, a stake amount and an owner, and is mutated
//! only through [`GridStore::apply_event_batch`]. Events are ordered by an
//! [`OrderKey`] `(timestamp, log_index)`; each field keeps the key of the
//! event that last wrote it and only a greater-or-equal key may overwrite
//! it. That makes applying a batch idempotent and makes the final state
//! independent of arrival order.
//!
//! # Derived values
//!
//! Total stake and per-owner tallies are computed on demand and cached
//! until the next batch bumps the store version.

mod cell;
mod error;
mod event;
mod order;
mod stake;
mod store;

pub use cell::{Address, Cell, CellId, Color, TxHash};
pub use error::{Error, Result};
pub use event::CellEvent;
pub use order::OrderKey;
pub use stake::{Stake, DECIMALS, UNITS_PER_TOKEN};
pub use store::{BatchOutcome, GridStore, OwnerTally};

/// Grid width in cells.
pub const WIDTH: u32 = 100;

/// Grid height in cells.
pub const HEIGHT: u32 = 100;

/// Total number of addressable cells.
pub const CELL_COUNT: usize = (WIDTH * HEIGHT) as usize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_dimensions() {
        assert_eq!(CELL_COUNT, 10_000);
        assert_eq!(CellId::from_xy(WIDTH - 1, HEIGHT - 1), Some(CellId(CELL_COUNT as u32 - 1)));
    }
}
