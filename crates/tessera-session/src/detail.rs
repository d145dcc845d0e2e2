//! Selection detail: everything the detail panel shows for one cell.

use chrono::{DateTime, Utc};

use tessera_grid::{Cell, CellId, Color, GridStore, Stake};
use tessera_ingest::{AggregateBook, HistoryBook, ProjectSummary};

use crate::error::Result;

/// Derived view of a selected cell.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionDetail {
    pub cell: Cell,
    /// This cell's stake as a percent of all stake.
    pub share_percent: f64,
    /// Cells held by the owner.
    pub control_count: usize,
    /// Cells held by the owner as a percent of the grid.
    pub control_percent: f64,
    /// Stake held by the owner across all cells.
    pub owner_stake: Stake,
    /// The last few colors, oldest first, black-padded.
    pub recent_colors: Vec<Color>,
    /// `(timestamp, stake)` over the known history, oldest first.
    pub activity: Vec<(DateTime<Utc>, Stake)>,
    pub project: Option<ProjectSummary>,
}

impl SelectionDetail {
    /// Gather the detail for `cell`. Fails with `NotFound` off the grid.
    ///
    /// An unowned cell reports no control and no owner stake.
    pub fn build(
        store: &GridStore,
        history: &HistoryBook,
        aggregates: &AggregateBook,
        cell: CellId,
        recent: usize,
    ) -> Result<Self> {
        let current = store.get_by_id(cell)?.clone();
        let tally = if current.owner.is_zero() {
            Default::default()
        } else {
            store.owner_tally(&current.owner)
        };

        Ok(Self {
            share_percent: store.share_of_total(current.stake),
            control_count: tally.cells,
            control_percent: tally.control_percent(),
            owner_stake: tally.stake,
            recent_colors: history.last_colors(cell, recent),
            activity: history.activity(cell),
            project: aggregates.get(&current.owner).cloned(),
            cell: current,
        })
    }
}
