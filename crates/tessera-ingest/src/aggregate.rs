//! Owner/project summaries refreshed in the background.
//!
//! Refreshes are fire-and-forget tokio tasks. Results are handed to a
//! [`SummarySink`] (the session inbox in practice) and applied by the
//! single writer; a failed refresh is logged and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use tessera_grid::{Address, CellId, Stake};

use crate::error::{Error, Result};
use crate::source::SummarySource;
use crate::wire::SummaryRecord;

/// Validated project summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub address: Address,
    pub balance: Stake,
    /// Cheapest cell the project is bidding on, if it reported one.
    pub best_cell: Option<CellId>,
    pub best_cost: Option<Stake>,
    pub gas_used: Option<Stake>,
    pub gas_available: Option<Stake>,
}

impl TryFrom<SummaryRecord> for ProjectSummary {
    type Error = Error;

    fn try_from(rec: SummaryRecord) -> Result<Self> {
        let address = Address::parse(&rec.address).map_err(Error::malformed)?;
        let best_cell = match (rec.best_col, rec.best_row) {
            (Some(x), Some(y)) => Some(
                CellId::from_xy(x, y)
                    .ok_or_else(|| Error::malformed(format!("best cell ({x}, {y}) outside the grid")))?,
            ),
            _ => None,
        };
        Ok(Self {
            address,
            balance: rec.balance.0,
            best_cell,
            best_cost: rec.best_cost.map(|a| a.0),
            gas_used: rec.gas_used.map(|a| a.0),
            gas_available: rec.gas_available.map(|a| a.0),
        })
    }
}

/// Latest summary per address.
#[derive(Debug, Default)]
pub struct AggregateBook {
    summaries: HashMap<Address, ProjectSummary>,
}

impl AggregateBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; returns the previous summary if there was one.
    pub fn upsert(&mut self, summary: ProjectSummary) -> Option<ProjectSummary> {
        self.summaries.insert(summary.address.clone(), summary)
    }

    pub fn get(&self, address: &Address) -> Option<&ProjectSummary> {
        self.summaries.get(address)
    }

    pub fn len(&self) -> usize {
        self.summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

/// Where refreshed summaries are delivered.
pub type SummarySink = Arc<dyn Fn(ProjectSummary) + Send + Sync>;

/// Spawns delayed summary refreshes and tracks them for shutdown.
pub struct RefreshScheduler {
    source: Arc<dyn SummarySource>,
    sink: SummarySink,
    tasks: Vec<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn SummarySource>, sink: SummarySink) -> Self {
        Self {
            source,
            sink,
            tasks: Vec::new(),
        }
    }

    /// Refresh `address` after `delay`. Needs a tokio runtime; without one
    /// the refresh is skipped with a warning.
    pub fn schedule(&mut self, address: Address, delay: Duration) {
        let handle = match Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                warn!(%address, "no async runtime; summary refresh skipped");
                return;
            }
        };
        self.tasks.retain(|t| !t.is_finished());

        let source = Arc::clone(&self.source);
        let sink = Arc::clone(&self.sink);
        debug!(%address, delay_ms = delay.as_millis() as u64, "scheduling summary refresh");
        self.tasks.push(handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let fetched = source
                .fetch_summary(&address)
                .await
                .and_then(ProjectSummary::try_from);
            match fetched {
                Ok(summary) => sink(summary),
                Err(e) => warn!(%address, error = %e, "summary refresh failed"),
            }
        }));
    }

    /// Refreshes not yet finished.
    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Abort every outstanding refresh.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("tasks", &self.tasks.len())
            .finish()
    }
}
