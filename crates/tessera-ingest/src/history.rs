//! Per-cell event history.
//!
//! History is fetched lazily, once per cell per session, and extended by
//! every live event the ingestor applies. Entries are keyed by order key so
//! a live event and the same event arriving in a later history fetch
//! collapse into one entry.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tessera_grid::{Address, CellEvent, CellId, Color, OrderKey, Stake, TxHash};

/// One historical state of a cell, with every field filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub cell: CellId,
    pub key: OrderKey,
    pub tx_hash: TxHash,
    pub color: Color,
    pub owner: Address,
    pub stake: Stake,
}

impl HistoryEntry {
    /// Express the entry as a full delta, for folding into the store.
    pub fn to_event(&self) -> CellEvent {
        CellEvent::new(self.cell, self.key, self.tx_hash.clone())
            .with_color(self.color)
            .with_owner(self.owner.clone())
            .with_stake(self.stake)
    }
}

/// Fetch bookkeeping and entries for every cell seen so far.
#[derive(Debug, Default)]
pub struct HistoryBook {
    entries: HashMap<CellId, BTreeMap<OrderKey, HistoryEntry>>,
    fetched: HashSet<CellId>,
    in_flight: HashSet<CellId>,
}

impl HistoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry at `(entry.cell, entry.key)`.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries
            .entry(entry.cell)
            .or_default()
            .insert(entry.key, entry);
    }

    /// Entries of a cell, oldest first.
    pub fn entries(&self, cell: CellId) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.entries.get(&cell).into_iter().flat_map(|m| m.values())
    }

    /// The newest entry of `cell` keyed strictly before `key`.
    pub fn latest_before(&self, cell: CellId, key: OrderKey) -> Option<&HistoryEntry> {
        self.entries
            .get(&cell)
            .and_then(|m| m.range(..key).next_back())
            .map(|(_, e)| e)
    }

    pub fn len(&self, cell: CellId) -> usize {
        self.entries.get(&cell).map_or(0, BTreeMap::len)
    }

    /// The last `n` colors of a cell, oldest first, padded in front with
    /// black when fewer than `n` entries are known.
    pub fn last_colors(&self, cell: CellId, n: usize) -> Vec<Color> {
        let known: Vec<Color> = self.entries(cell).map(|e| e.color).collect();
        let start = known.len().saturating_sub(n);
        let mut out = vec![Color::BLACK; n.saturating_sub(known.len())];
        out.extend_from_slice(&known[start..]);
        out
    }

    /// `(timestamp, stake)` pairs sorted by time.
    pub fn activity(&self, cell: CellId) -> Vec<(DateTime<Utc>, Stake)> {
        self.entries(cell)
            .map(|e| (e.key.timestamp, e.stake))
            .collect()
    }

    pub fn is_fetched(&self, cell: CellId) -> bool {
        self.fetched.contains(&cell)
    }

    /// Claim the fetch of a cell's history. Returns `false` when the cell
    /// was already fetched or a fetch is in flight.
    pub fn begin_fetch(&mut self, cell: CellId) -> bool {
        if self.fetched.contains(&cell) {
            return false;
        }
        self.in_flight.insert(cell)
    }

    /// Release a claimed fetch; only a successful one marks the cell fetched.
    pub fn finish_fetch(&mut self, cell: CellId, ok: bool) {
        self.in_flight.remove(&cell);
        if ok {
            self.fetched.insert(cell);
        }
    }

    pub fn in_flight(&self, cell: CellId) -> bool {
        self.in_flight.contains(&cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(cell: u32, ts: i64, idx: u32, color: u32) -> HistoryEntry {
        HistoryEntry {
            cell: CellId(cell),
            key: OrderKey::from_unix(ts, idx).unwrap(),
            tx_hash: TxHash::zero(),
            color: Color::new(color as u64).unwrap(),
            owner: Address::zero(),
            stake: Stake::from_base_units(ts as u128),
        }
    }

    #[test]
    fn entries_sorted_by_key_regardless_of_arrival() {
        let mut book = HistoryBook::new();
        book.record(entry(1, 20, 0, 2));
        book.record(entry(1, 10, 5, 1));
        book.record(entry(1, 20, 1, 3));
        let colors: Vec<u32> = book.entries(CellId(1)).map(|e| e.color.rgb()).collect();
        assert_eq!(colors, vec![1, 2, 3]);
    }

    #[test]
    fn same_key_is_upserted() {
        let mut book = HistoryBook::new();
        book.record(entry(1, 10, 0, 1));
        book.record(entry(1, 10, 0, 9));
        assert_eq!(book.len(CellId(1)), 1);
        assert_eq!(book.entries(CellId(1)).next().unwrap().color.rgb(), 9);
    }

    #[test]
    fn latest_before_skips_equal_and_newer_keys() {
        let mut book = HistoryBook::new();
        book.record(entry(1, 10, 0, 1));
        book.record(entry(1, 20, 0, 2));
        book.record(entry(1, 30, 0, 3));
        let at = |ts| OrderKey::from_unix(ts, 0).unwrap();
        assert_eq!(book.latest_before(CellId(1), at(20)).map(|e| e.color.rgb()), Some(1));
        assert_eq!(book.latest_before(CellId(1), at(25)).map(|e| e.color.rgb()), Some(2));
        assert!(book.latest_before(CellId(1), at(10)).is_none());
        assert!(book.latest_before(CellId(2), at(99)).is_none());
    }

    #[test]
    fn last_colors_pads_with_black() {
        let mut book = HistoryBook::new();
        book.record(entry(1, 10, 0, 7));
        book.record(entry(1, 11, 0, 8));
        let colors: Vec<u32> = book.last_colors(CellId(1), 5).iter().map(Color::rgb).collect();
        assert_eq!(colors, vec![0, 0, 0, 7, 8]);
    }

    #[test]
    fn last_colors_keeps_newest() {
        let mut book = HistoryBook::new();
        for i in 0..7 {
            book.record(entry(1, 10 + i, 0, i as u32));
        }
        let colors: Vec<u32> = book.last_colors(CellId(1), 5).iter().map(Color::rgb).collect();
        assert_eq!(colors, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn fetch_claims_are_exclusive_and_retry_after_failure() {
        let mut book = HistoryBook::new();
        assert!(book.begin_fetch(CellId(3)));
        assert!(!book.begin_fetch(CellId(3)));
        book.finish_fetch(CellId(3), false);
        assert!(!book.is_fetched(CellId(3)));
        assert!(book.begin_fetch(CellId(3)));
        book.finish_fetch(CellId(3), true);
        assert!(book.is_fetched(CellId(3)));
        assert!(!book.begin_fetch(CellId(3)));
    }

    #[test]
    fn activity_follows_time() {
        let mut book = HistoryBook::new();
        book.record(entry(2, 30, 0, 0));
        book.record(entry(2, 10, 0, 0));
        let stakes: Vec<u128> = book.activity(CellId(2)).iter().map(|(_, s)| s.base_units()).collect();
        assert_eq!(stakes, vec![10, 30]);
    }
}
