//! Tessera Event Ingestion
//!
//! Turns the three upstream sources into ordered grid event batches:
//!
//! - **Snapshot**: the cumulative state of every staked cell, keyed at the
//!   instant its fetch started.
//! - **History**: every event of one cell, fetched lazily the first time the
//!   cell is selected.
//! - **Live feed**: decoded contract logs pushed as they are mined. Batch
//!   kinds expand to one delta per cell.
//!
//! Each delivery is validated, malformed parts are dropped with a warning,
//! and the rest is applied to the [`GridStore`](tessera_grid::GridStore) as
//! one atomic batch.
//!
//! Owner and project summaries are refreshed in the background after live
//! batches and project creation; see [`RefreshScheduler`].

mod aggregate;
mod error;
mod feed;
mod history;
mod ingestor;
mod source;
mod wire;

pub use aggregate::{AggregateBook, ProjectSummary, RefreshScheduler, SummarySink};
pub use error::{Error, Result};
pub use feed::{FeedEntry, FeedEvent};
pub use history::{HistoryBook, HistoryEntry};
pub use ingestor::{
    IngestConfig, IngestReport, Ingestor, LoadStatus, AGGREGATE_SETTLE_DELAY, OWNER_REFRESH_DELAY,
};
pub use source::{GridSource, MemorySource, SummarySource};
pub use wire::{parse_timestamp, HistoryRecord, RawAmount, SnapshotRecord, SummaryRecord};
