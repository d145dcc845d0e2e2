//! Per-cell deltas.

use serde::{Deserialize, Serialize};

use crate::{Address, CellId, Color, OrderKey, Stake, TxHash};

/// A delta for one cell. `None` fields leave the cell's value unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellEvent {
    pub cell: CellId,
    pub key: OrderKey,
    pub tx_hash: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<Stake>,
}

impl CellEvent {
    /// An event that touches no field yet.
    pub fn new(cell: CellId, key: OrderKey, tx_hash: TxHash) -> Self {
        Self {
            cell,
            key,
            tx_hash,
            color: None,
            owner: None,
            stake: None,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_stake(mut self, stake: Stake) -> Self {
        self.stake = Some(stake);
        self
    }
}
