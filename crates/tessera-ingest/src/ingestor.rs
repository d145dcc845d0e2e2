//! The ingestor: merges snapshot, history and live feed into the store.
//!
//! Every path ends in exactly one [`GridStore::apply_event_batch`] call, so
//! readers never observe half of a snapshot, a history page or a feed
//! delivery. Fetching is split from applying (`begin_*` / `apply_*`) so a
//! host can run fetches on other tasks and hand the results back to the
//! single writer; `load_snapshot` and `ensure_history` do both inline.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use tessera_grid::{Address, CellEvent, CellId, GridStore, OrderKey};

use crate::aggregate::RefreshScheduler;
use crate::error::Result;
use crate::feed::{FeedEntry, FeedEvent};
use crate::history::{HistoryBook, HistoryEntry};
use crate::source::GridSource;
use crate::wire::{HistoryRecord, SnapshotRecord};

/// Delay before refreshing a freshly created project, giving the summary
/// endpoint time to index it.
pub const AGGREGATE_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Delay before refreshing owners touched by a live batch.
pub const OWNER_REFRESH_DELAY: Duration = Duration::ZERO;

/// Ingestor configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub settle_delay: Duration,
    pub owner_refresh_delay: Duration,
    /// Refresh the summaries of owners touched by live batches.
    pub refresh_owners: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            settle_delay: AGGREGATE_SETTLE_DELAY,
            owner_refresh_delay: OWNER_REFRESH_DELAY,
            refresh_owners: true,
        }
    }
}

/// Progress of the initial snapshot load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// What one ingestion call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Cell events handed to the store.
    pub applied: usize,
    /// Entries or rows rejected as malformed.
    pub dropped: usize,
    /// Cells whose visible state changed.
    pub changed: Vec<CellId>,
}

impl IngestReport {
    fn dropped_only(dropped: usize) -> Self {
        Self {
            dropped,
            ..Self::default()
        }
    }
}

/// Event ingestor.
pub struct Ingestor {
    config: IngestConfig,
    source: Arc<dyn GridSource>,
    history: HistoryBook,
    status: LoadStatus,
    /// When the pending snapshot fetch started.
    snapshot_started: Option<DateTime<Utc>>,
    refresher: Option<RefreshScheduler>,
}

impl Ingestor {
    pub fn new(config: IngestConfig, source: Arc<dyn GridSource>) -> Self {
        Self {
            config,
            source,
            history: HistoryBook::new(),
            status: LoadStatus::Idle,
            snapshot_started: None,
            refresher: None,
        }
    }

    /// Attach a scheduler for summary refreshes. Without one, aggregate
    /// side effects are skipped.
    pub fn with_refresher(mut self, refresher: RefreshScheduler) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn history(&self) -> &HistoryBook {
        &self.history
    }

    /// Shared handle to the upstream source, for hosts that fetch on their
    /// own tasks.
    pub fn source(&self) -> Arc<dyn GridSource> {
        Arc::clone(&self.source)
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Mark the snapshot as loading and note when the fetch started.
    pub fn begin_snapshot(&mut self) {
        let started = Utc::now();
        debug!(%started, "snapshot load started");
        self.snapshot_started = Some(started);
        self.status = LoadStatus::Loading;
    }

    /// Apply a fetched snapshot as one batch.
    ///
    /// Rows are keyed at the fetch start (see [`OrderKey::snapshot`]), so
    /// they override events logged before the fetch and yield to events
    /// logged after it. Without a preceding [`begin_snapshot`] the current
    /// time is used. Malformed rows are dropped; a fetch failure moves the
    /// status to `Failed` and is returned unchanged.
    ///
    /// [`begin_snapshot`]: Self::begin_snapshot
    pub fn apply_snapshot(
        &mut self,
        store: &mut GridStore,
        fetched: Result<Vec<SnapshotRecord>>,
    ) -> Result<IngestReport> {
        let started = self.snapshot_started.take().unwrap_or_else(Utc::now);
        let key = OrderKey::snapshot(started);
        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "snapshot fetch failed");
                self.status = LoadStatus::Failed(e.to_string());
                return Err(e);
            }
        };

        let mut dropped = 0;
        let events: Vec<CellEvent> = rows
            .iter()
            .filter_map(|row| match row.to_event(key) {
                Ok(ev) => Some(ev),
                Err(e) => {
                    warn!(id = row.id, error = %e, "dropping snapshot row");
                    dropped += 1;
                    None
                }
            })
            .collect();

        let applied = events.len();
        let outcome = match store.apply_event_batch(events) {
            Ok(o) => o,
            Err(e) => {
                self.status = LoadStatus::Failed(e.to_string());
                return Err(e.into());
            }
        };
        self.status = LoadStatus::Ready;
        info!(rows = applied, dropped, changed = outcome.changed.len(), "snapshot loaded");
        Ok(IngestReport {
            applied,
            dropped,
            changed: outcome.changed,
        })
    }

    /// Fetch and apply the full snapshot.
    pub async fn load_snapshot(&mut self, store: &mut GridStore) -> Result<IngestReport> {
        self.begin_snapshot();
        let fetched = self.source.fetch_snapshot().await;
        self.apply_snapshot(store, fetched)
    }

    // ------------------------------------------------------------------
    // Live feed
    // ------------------------------------------------------------------

    /// Decode raw JSON feed values, then ingest them.
    pub fn ingest_raw(&mut self, store: &mut GridStore, values: Vec<Value>) -> Result<IngestReport> {
        let mut dropped = 0;
        let entries: Vec<FeedEntry> = values
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<FeedEntry>(v) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "dropping undecodable feed entry");
                    dropped += 1;
                    None
                }
            })
            .collect();
        let mut report = self.ingest_live(store, entries)?;
        report.dropped += dropped;
        Ok(report)
    }

    /// Apply one delivery of live feed entries as a single batch.
    ///
    /// Malformed entries are dropped whole and logged; the rest are applied
    /// atomically, recorded into per-cell history, and the owners they
    /// touch are scheduled for a summary refresh.
    pub fn ingest_live(
        &mut self,
        store: &mut GridStore,
        entries: Vec<FeedEntry>,
    ) -> Result<IngestReport> {
        let mut dropped = 0;
        let mut events = Vec::new();
        let mut projects = Vec::new();

        for entry in &entries {
            match entry.decode() {
                Ok(FeedEvent::Cells(evs)) => events.extend(evs),
                Ok(FeedEvent::ProjectCreated { project, creator }) => {
                    info!(%project, %creator, "project created");
                    projects.push(project);
                }
                Err(e) => {
                    warn!(
                        event = %entry.event_name,
                        tx = %entry.transaction_hash,
                        log_index = entry.log_index,
                        error = %e,
                        "dropping feed entry"
                    );
                    dropped += 1;
                }
            }
        }

        for project in projects {
            self.schedule_refresh(project, self.config.settle_delay);
        }

        if events.is_empty() {
            return Ok(IngestReport::dropped_only(dropped));
        }

        let history = self.history_entries(store, &events);
        let owners = affected_owners(store, &events);
        let applied = events.len();
        let outcome = store.apply_event_batch(events)?;

        for entry in history {
            self.history.record(entry);
        }
        if self.config.refresh_owners {
            for owner in owners {
                self.schedule_refresh(owner, self.config.owner_refresh_delay);
            }
        }

        debug!(applied, dropped, changed = outcome.changed.len(), "live batch ingested");
        Ok(IngestReport {
            applied,
            dropped,
            changed: outcome.changed,
        })
    }

    /// Full-valued history entries for a batch about to be applied.
    ///
    /// Fields an event omits take their value from the cell's previous
    /// entry, recorded or earlier in the same batch. A cell with no known
    /// history falls back to its current state in the store.
    fn history_entries(&self, store: &GridStore, events: &[CellEvent]) -> Vec<HistoryEntry> {
        let mut ordered: Vec<&CellEvent> = events.iter().collect();
        ordered.sort_by(|a, b| a.key.cmp(&b.key));

        let mut last_in_batch: HashMap<CellId, usize> = HashMap::new();
        let mut out: Vec<HistoryEntry> = Vec::with_capacity(ordered.len());
        for ev in ordered {
            let recorded = self.history.latest_before(ev.cell, ev.key);
            let batched = last_in_batch.get(&ev.cell).map(|&i| &out[i]);
            let prior = match (recorded, batched) {
                (Some(r), Some(b)) => Some(if r.key > b.key { r } else { b }),
                (r, b) => r.or(b),
            };
            let (color, owner, stake) = match prior {
                Some(p) => (p.color, p.owner.clone(), p.stake),
                None => {
                    let Ok(cell) = store.get_by_id(ev.cell) else {
                        continue;
                    };
                    (cell.color, cell.owner.clone(), cell.stake)
                }
            };
            let entry = HistoryEntry {
                cell: ev.cell,
                key: ev.key,
                tx_hash: ev.tx_hash.clone(),
                color: ev.color.unwrap_or(color),
                owner: ev.owner.clone().unwrap_or(owner),
                stake: ev.stake.unwrap_or(stake),
            };
            last_in_batch.insert(ev.cell, out.len());
            out.push(entry);
        }
        out
    }

    // ------------------------------------------------------------------
    // Per-cell history
    // ------------------------------------------------------------------

    /// Claim the history fetch for `cell`. Returns `false` when the history
    /// was already fetched this session or a fetch is in flight.
    pub fn begin_history(&mut self, cell: CellId) -> bool {
        let claimed = self.history.begin_fetch(cell);
        if claimed {
            debug!(%cell, "history fetch started");
        }
        claimed
    }

    /// Apply a fetched history page for `cell`.
    ///
    /// A failed fetch leaves the cell unfetched so a later call retries.
    /// Records are stored in the history book and folded into the store.
    pub fn apply_history(
        &mut self,
        store: &mut GridStore,
        cell: CellId,
        fetched: Result<Vec<HistoryRecord>>,
    ) -> Result<IngestReport> {
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                warn!(%cell, error = %e, "history fetch failed");
                self.history.finish_fetch(cell, false);
                return Err(e);
            }
        };

        let mut dropped = 0;
        let mut entries = Vec::with_capacity(records.len());
        for rec in &records {
            match rec.to_entry() {
                Ok(entry) if entry.cell == cell => entries.push(entry),
                Ok(entry) => {
                    warn!(%cell, got = %entry.cell, "dropping history record for another cell");
                    dropped += 1;
                }
                Err(e) => {
                    warn!(%cell, error = %e, "dropping history record");
                    dropped += 1;
                }
            }
        }

        let events: Vec<CellEvent> = entries.iter().map(HistoryEntry::to_event).collect();
        let applied = events.len();
        let outcome = store.apply_event_batch(events)?;
        for entry in entries {
            self.history.record(entry);
        }
        self.history.finish_fetch(cell, true);

        debug!(%cell, applied, dropped, "history loaded");
        Ok(IngestReport {
            applied,
            dropped,
            changed: outcome.changed,
        })
    }

    /// Fetch a cell's history unless it was already fetched this session.
    /// Returns `None` when nothing was fetched.
    pub async fn ensure_history(
        &mut self,
        store: &mut GridStore,
        cell: CellId,
    ) -> Result<Option<IngestReport>> {
        if !cell.is_valid() {
            return Err(tessera_grid::Error::NotFound(cell).into());
        }
        if !self.begin_history(cell) {
            return Ok(None);
        }
        let fetched = self.source.fetch_history(cell).await;
        self.apply_history(store, cell, fetched).map(Some)
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// Schedule a summary refresh for `address`.
    pub fn schedule_refresh(&mut self, address: Address, delay: Duration) {
        match self.refresher.as_mut() {
            Some(r) => r.schedule(address, delay),
            None => debug!(%address, "no refresher attached; summary refresh skipped"),
        }
    }

    /// Abort outstanding background work.
    pub fn shutdown(&mut self) {
        if let Some(r) = self.refresher.as_mut() {
            r.shutdown();
        }
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("status", &self.status)
            .field("refresher", &self.refresher)
            .finish_non_exhaustive()
    }
}

/// Non-zero owners before or after the batch for every touched cell.
fn affected_owners(store: &GridStore, events: &[CellEvent]) -> BTreeSet<Address> {
    let mut owners = BTreeSet::new();
    for ev in events {
        if let Ok(cell) = store.get_by_id(ev.cell) {
            owners.insert(cell.owner.clone());
        }
        if let Some(owner) = &ev.owner {
            owners.insert(owner.clone());
        }
    }
    owners.retain(|a| !a.is_zero());
    owners
}
