//! Upstream data sources.
//!
//! The network transport lives outside this crate; hosts implement these
//! traits over whatever client they use. [`MemorySource`] serves fixtures
//! and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tessera_grid::{Address, CellId};

use crate::error::{Error, Result};
use crate::wire::{HistoryRecord, SnapshotRecord, SummaryRecord};

/// Snapshot and per-cell history endpoints.
#[async_trait]
pub trait GridSource: Send + Sync {
    /// The cumulative state of every cell that was ever staked.
    async fn fetch_snapshot(&self) -> Result<Vec<SnapshotRecord>>;

    /// Every recorded event for one cell, in log order.
    async fn fetch_history(&self, cell: CellId) -> Result<Vec<HistoryRecord>>;
}

/// Owner/project summary endpoint.
#[async_trait]
pub trait SummarySource: Send + Sync {
    async fn fetch_summary(&self, address: &Address) -> Result<SummaryRecord>;
}

#[derive(Debug, Default)]
struct MemoryInner {
    snapshot: Vec<SnapshotRecord>,
    history: HashMap<CellId, Vec<HistoryRecord>>,
    summaries: HashMap<Address, SummaryRecord>,
    fail_next: usize,
    history_calls: HashMap<CellId, usize>,
    summary_calls: usize,
}

/// In-memory source backed by fixture records.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_snapshot(&self, rows: Vec<SnapshotRecord>) {
        self.inner.lock().await.snapshot = rows;
    }

    pub async fn set_history(&self, cell: CellId, rows: Vec<HistoryRecord>) {
        self.inner.lock().await.history.insert(cell, rows);
    }

    pub async fn set_summary(&self, address: Address, summary: SummaryRecord) {
        self.inner.lock().await.summaries.insert(address, summary);
    }

    /// Make the next `n` fetches of any kind fail with `TransientFetch`.
    pub async fn fail_next(&self, n: usize) {
        self.inner.lock().await.fail_next = n;
    }

    /// How many times the history of `cell` was requested.
    pub async fn history_calls(&self, cell: CellId) -> usize {
        self.inner.lock().await.history_calls.get(&cell).copied().unwrap_or(0)
    }

    pub async fn summary_calls(&self) -> usize {
        self.inner.lock().await.summary_calls
    }
}

impl MemoryInner {
    fn check_failure(&mut self, what: &str) -> Result<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(Error::TransientFetch(format!("{what}: injected failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl GridSource for MemorySource {
    async fn fetch_snapshot(&self) -> Result<Vec<SnapshotRecord>> {
        let mut inner = self.inner.lock().await;
        inner.check_failure("snapshot")?;
        Ok(inner.snapshot.clone())
    }

    async fn fetch_history(&self, cell: CellId) -> Result<Vec<HistoryRecord>> {
        let mut inner = self.inner.lock().await;
        *inner.history_calls.entry(cell).or_default() += 1;
        inner.check_failure("history")?;
        Ok(inner.history.get(&cell).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl SummarySource for MemorySource {
    async fn fetch_summary(&self, address: &Address) -> Result<SummaryRecord> {
        let mut inner = self.inner.lock().await;
        inner.summary_calls += 1;
        inner.check_failure("summary")?;
        inner
            .summaries
            .get(address)
            .cloned()
            .ok_or_else(|| Error::TransientFetch(format!("no summary for {address}")))
    }
}
