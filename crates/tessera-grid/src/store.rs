//! The grid store.
//!
//! Holds every cell in id order and applies event batches atomically. The
//! store is owned by whoever writes to it; readers borrow it, so a batch is
//! either fully visible or not visible at all.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::{Address, Cell, CellEvent, CellId, Stake, CELL_COUNT};

/// Cells and stake held by one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerTally {
    pub cells: usize,
    pub stake: Stake,
}

impl OwnerTally {
    /// Share of the whole grid this owner controls, in percent.
    pub fn control_percent(&self) -> f64 {
        self.cells as f64 * 100.0 / CELL_COUNT as f64
    }
}

/// Result of a successfully applied batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Store version after the batch.
    pub version: u64,
    /// Cells whose visible state changed, in id order.
    pub changed: Vec<CellId>,
}

/// Derived values computed in one pass over the cells.
#[derive(Debug)]
struct Summary {
    version: u64,
    total: Stake,
    owners: HashMap<Address, OwnerTally>,
}

/// Normalized, id-addressable cache of all cell state.
#[derive(Debug)]
pub struct GridStore {
    cells: Vec<Cell>,
    version: u64,
    summary: OnceLock<Summary>,
}

impl Default for GridStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GridStore {
    /// Create a store with every cell in its startup state.
    pub fn new() -> Self {
        Self {
            cells: CellId::all().map(Cell::empty).collect(),
            version: 0,
            summary: OnceLock::new(),
        }
    }

    /// Monotonic counter, bumped once per applied batch.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; the grid is created full.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// All cells in id order.
    pub fn get_all(&self) -> &[Cell] {
        &self.cells
    }

    /// Look up one cell.
    pub fn get_by_id(&self, id: CellId) -> Result<&Cell> {
        self.cells.get(id.index()).ok_or(Error::NotFound(id))
    }

    /// Look up a cell by coordinates.
    pub fn get_at(&self, x: u32, y: u32) -> Option<&Cell> {
        CellId::from_xy(x, y).and_then(|id| self.cells.get(id.index()))
    }

    /// Apply a batch of events as one atomic update.
    ///
    /// Events are sorted by order key (stable, so equal keys keep arrival
    /// order), grouped per cell on a staging copy, and committed only once
    /// every event has been folded. A batch naming a cell outside the grid,
    /// or one that would push total stake past `u128::MAX` base units, is
    /// rejected whole and the store is left untouched.
    pub fn apply_event_batch<I>(&mut self, events: I) -> Result<BatchOutcome>
    where
        I: IntoIterator<Item = CellEvent>,
    {
        let mut events: Vec<CellEvent> = events.into_iter().collect();
        if let Some(bad) = events.iter().find(|e| !e.cell.is_valid()) {
            return Err(Error::NotFound(bad.cell));
        }
        events.sort_by(|a, b| a.key.cmp(&b.key));

        let mut staged: BTreeMap<CellId, Cell> = BTreeMap::new();
        for event in &events {
            staged
                .entry(event.cell)
                .or_insert_with(|| self.cells[event.cell.index()].clone())
                .absorb(event);
        }

        let total = self
            .cells
            .iter()
            .map(|c| staged.get(&c.id).map_or(c.stake, |s| s.stake))
            .try_fold(Stake::ZERO, Stake::checked_add);
        if total.is_none() {
            warn!(events = events.len(), "batch rejected: total stake would overflow");
            return Err(Error::InvalidAmount("total stake overflows u128 base units".into()));
        }

        let mut changed = Vec::new();
        for (id, cell) in staged {
            let slot = &mut self.cells[id.index()];
            if !slot.same_state(&cell) {
                changed.push(id);
            }
            *slot = cell;
        }

        self.version += 1;
        self.summary = OnceLock::new();
        debug!(
            version = self.version,
            events = events.len(),
            changed = changed.len(),
            "applied event batch"
        );

        Ok(BatchOutcome {
            version: self.version,
            changed,
        })
    }

    fn summary(&self) -> &Summary {
        self.summary.get_or_init(|| {
            let mut total = Stake::ZERO;
            let mut owners: HashMap<Address, OwnerTally> = HashMap::new();
            for cell in &self.cells {
                total += cell.stake;
                let tally = owners.entry(cell.owner.clone()).or_default();
                tally.cells += 1;
                tally.stake += cell.stake;
            }
            Summary {
                version: self.version,
                total,
                owners,
            }
        })
    }

    /// Sum of stake over all cells.
    pub fn total_stake(&self) -> Stake {
        self.summary().total
    }

    /// Number of cells owned by `owner`.
    pub fn cell_count_of(&self, owner: &Address) -> usize {
        self.owner_tally(owner).cells
    }

    /// Stake held across all cells owned by `owner`.
    pub fn stake_of(&self, owner: &Address) -> Stake {
        self.owner_tally(owner).stake
    }

    /// Cells and stake of one owner; zero for unknown owners.
    pub fn owner_tally(&self, owner: &Address) -> OwnerTally {
        self.summary().owners.get(owner).copied().unwrap_or_default()
    }

    /// Every non-zero owner, largest stake first.
    pub fn owners(&self) -> Vec<(Address, OwnerTally)> {
        let mut owners: Vec<_> = self
            .summary()
            .owners
            .iter()
            .filter(|(a, _)| !a.is_zero())
            .map(|(a, t)| (a.clone(), *t))
            .collect();
        owners.sort_by(|a, b| b.1.stake.cmp(&a.1.stake).then_with(|| a.0.cmp(&b.0)));
        owners
    }

    /// Percent of total stake held by `stake`.
    pub fn share_of_total(&self, stake: Stake) -> f64 {
        stake.percent_of(self.total_stake())
    }

    /// Version the cached selectors were computed at, if any are cached.
    pub fn selectors_version(&self) -> Option<u64> {
        self.summary.get().map(|s| s.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Color, OrderKey, TxHash};

    fn key(ts: i64, idx: u32) -> OrderKey {
        OrderKey::from_unix(ts, idx).unwrap()
    }

    fn tx() -> TxHash {
        TxHash::parse("0xabc").unwrap()
    }

    fn alice() -> Address {
        Address::parse("0x1111111111111111111111111111111111111111").unwrap()
    }

    fn bob() -> Address {
        Address::parse("0x2222222222222222222222222222222222222222").unwrap()
    }

    fn red() -> Color {
        Color::new(0xFF0000).unwrap()
    }

    #[test]
    fn starts_with_every_cell_empty() {
        let store = GridStore::new();
        assert_eq!(store.len(), CELL_COUNT);
        assert_eq!(store.version(), 0);
        let ids: Vec<_> = store.get_all().iter().map(|c| c.id.0).collect();
        assert_eq!(ids, (0..CELL_COUNT as u32).collect::<Vec<_>>());
        assert_eq!(store.total_stake(), Stake::ZERO);
        assert_eq!(store.cell_count_of(&Address::zero()), CELL_COUNT);
    }

    #[test]
    fn get_by_id_out_of_range() {
        let store = GridStore::new();
        let id = CellId(CELL_COUNT as u32);
        assert_eq!(store.get_by_id(id), Err(Error::NotFound(id)));
    }

    #[test]
    fn applies_only_specified_fields() {
        let mut store = GridStore::new();
        let id = CellId(7);
        store
            .apply_event_batch([CellEvent::new(id, key(10, 0), tx())
                .with_color(red())
                .with_owner(alice())
                .with_stake(Stake::from_tokens(2))])
            .unwrap();
        store
            .apply_event_batch([CellEvent::new(id, key(11, 0), tx()).with_color(Color::BLACK)])
            .unwrap();

        let cell = store.get_by_id(id).unwrap();
        assert_eq!(cell.color, Color::BLACK);
        assert_eq!(cell.owner, alice());
        assert_eq!(cell.stake, Stake::from_tokens(2));
    }

    #[test]
    fn later_key_wins_within_batch_regardless_of_arrival() {
        let mut store = GridStore::new();
        let id = CellId(42);
        let newer = CellEvent::new(id, key(20, 5), tx()).with_color(red());
        let older = CellEvent::new(id, key(20, 3), tx()).with_color(Color::from_rgb(0, 0, 255));
        store.apply_event_batch([newer, older]).unwrap();
        assert_eq!(store.get_by_id(id).unwrap().color, red());
    }

    #[test]
    fn older_event_in_later_batch_does_not_override() {
        let mut store = GridStore::new();
        let id = CellId(42);
        store
            .apply_event_batch([CellEvent::new(id, key(20, 5), tx()).with_stake(Stake::from_tokens(5))])
            .unwrap();
        let outcome = store
            .apply_event_batch([CellEvent::new(id, key(20, 3), tx()).with_stake(Stake::from_tokens(1))])
            .unwrap();
        assert!(outcome.changed.is_empty());
        assert_eq!(store.get_by_id(id).unwrap().stake, Stake::from_tokens(5));
    }

    #[test]
    fn rejected_batch_leaves_store_untouched() {
        let mut store = GridStore::new();
        let good = CellEvent::new(CellId(1), key(1, 0), tx()).with_color(red());
        let bad = CellEvent::new(CellId(CELL_COUNT as u32 + 3), key(1, 1), tx()).with_color(red());
        let err = store.apply_event_batch([good, bad]).unwrap_err();
        assert_eq!(err, Error::NotFound(CellId(CELL_COUNT as u32 + 3)));
        assert_eq!(store.version(), 0);
        assert_eq!(store.get_by_id(CellId(1)).unwrap().color, Color::BLACK);
    }

    #[test]
    fn reapplying_a_batch_changes_nothing() {
        let mut store = GridStore::new();
        let batch = vec![
            CellEvent::new(CellId(3), key(5, 1), tx()).with_color(red()).with_owner(alice()),
            CellEvent::new(CellId(3), key(5, 0), tx()).with_stake(Stake::from_tokens(1)),
            CellEvent::new(CellId(9), key(6, 0), tx()).with_owner(bob()),
        ];
        let first = store.apply_event_batch(batch.clone()).unwrap();
        let snapshot: Vec<Cell> = store.get_all().to_vec();
        let second = store.apply_event_batch(batch).unwrap();
        assert_eq!(first.changed, vec![CellId(3), CellId(9)]);
        assert!(second.changed.is_empty());
        assert_eq!(store.get_all(), snapshot.as_slice());
    }

    #[test]
    fn selectors_follow_batches() {
        let mut store = GridStore::new();
        store
            .apply_event_batch([
                CellEvent::new(CellId(1), key(1, 0), tx()).with_owner(alice()).with_stake(Stake::from_tokens(3)),
                CellEvent::new(CellId(2), key(1, 1), tx()).with_owner(alice()).with_stake(Stake::from_tokens(1)),
                CellEvent::new(CellId(3), key(1, 2), tx()).with_owner(bob()).with_stake(Stake::from_tokens(4)),
            ])
            .unwrap();

        assert_eq!(store.total_stake(), Stake::from_tokens(8));
        assert_eq!(store.selectors_version(), Some(1));
        assert_eq!(store.cell_count_of(&alice()), 2);
        assert_eq!(store.stake_of(&alice()), Stake::from_tokens(4));
        assert_eq!(store.share_of_total(Stake::from_tokens(4)), 50.0);

        let owners = store.owners();
        assert_eq!(owners[0].0, bob());
        assert_eq!(owners.len(), 2);

        store
            .apply_event_batch([CellEvent::new(CellId(3), key(2, 0), tx()).with_stake(Stake::ZERO)])
            .unwrap();
        assert_eq!(store.selectors_version(), None);
        assert_eq!(store.total_stake(), Stake::from_tokens(4));
        assert_eq!(store.selectors_version(), Some(2));
    }

    #[test]
    fn stake_delta_moves_total_exactly() {
        let mut store = GridStore::new();
        let before = store.total_stake();
        let delta = Stake::from_base_units(123_456_789);
        store
            .apply_event_batch([CellEvent::new(CellId(10), key(1, 0), tx()).with_stake(delta)])
            .unwrap();
        assert_eq!(store.total_stake().checked_sub(before), Some(delta));
    }

    #[test]
    fn batch_overflowing_the_total_is_rejected() {
        let mut store = GridStore::new();
        let half = Stake::from_base_units(u128::MAX / 2 + 1);
        store
            .apply_event_batch([CellEvent::new(CellId(1), key(1, 0), tx()).with_stake(half)])
            .unwrap();

        let err = store
            .apply_event_batch([
                CellEvent::new(CellId(2), key(2, 0), tx()).with_color(red()),
                CellEvent::new(CellId(3), key(2, 1), tx()).with_stake(half),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));
        assert_eq!(store.version(), 1);
        assert_eq!(store.get_by_id(CellId(2)).unwrap().color, Color::BLACK);
        assert_eq!(store.total_stake(), half);

        // Moving the same stake onto another cell keeps the sum in range.
        store
            .apply_event_batch([
                CellEvent::new(CellId(1), key(3, 0), tx()).with_stake(Stake::ZERO),
                CellEvent::new(CellId(3), key(3, 1), tx()).with_stake(half),
            ])
            .unwrap();
        assert_eq!(store.total_stake(), half);
    }

    #[test]
    fn last_tx_follows_newest_event() {
        let mut store = GridStore::new();
        let early = TxHash::parse("0x01").unwrap();
        let late = TxHash::parse("0x02").unwrap();
        store
            .apply_event_batch([
                CellEvent::new(CellId(5), key(9, 0), late.clone()).with_color(red()),
                CellEvent::new(CellId(5), key(3, 0), early).with_stake(Stake::from_tokens(1)),
            ])
            .unwrap();
        let cell = store.get_by_id(CellId(5)).unwrap();
        assert_eq!(cell.last_tx, late);
        assert_eq!(cell.last_key(), Some(key(9, 0)));
    }
}
