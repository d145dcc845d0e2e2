//! The session: one store, one ingestor, one set of view controllers.
//!
//! Async producers (push feed, fetch tasks, summary refreshes) never touch
//! session state. They post [`SessionMessage`]s to the inbox and the
//! session applies them on its own loop, either per frame with
//! [`Session::pump`] or continuously with [`Session::run`].

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tessera_grid::{CellId, GridStore};
use tessera_ingest::{
    AggregateBook, FeedEntry, GridSource, HistoryRecord, IngestReport, Ingestor, ProjectSummary,
    RefreshScheduler, SnapshotRecord, SummarySink, SummarySource,
};
use tessera_view::{
    DVec2, MinimapProjector, Rect, SurfaceHost, TileAppearance, TileController,
    ViewportController, ViewportState,
};

use crate::config::SessionConfig;
use crate::detail::SelectionDetail;
use crate::error::{Error, Result};

/// Work handed to the session's single writer.
#[derive(Debug)]
pub enum SessionMessage {
    /// Decoded live feed entries, applied as one batch.
    Feed(Vec<FeedEntry>),
    /// Undecoded live feed values.
    RawFeed(Vec<Value>),
    /// Result of a snapshot fetch.
    Snapshot(tessera_ingest::Result<Vec<SnapshotRecord>>),
    /// Result of a per-cell history fetch.
    History {
        cell: CellId,
        result: tessera_ingest::Result<Vec<HistoryRecord>>,
    },
    /// A refreshed owner/project summary.
    Summary(ProjectSummary),
}

/// Cloneable sender for producers outside the session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub fn send(&self, message: SessionMessage) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::InboxClosed)
    }

    pub fn send_feed(&self, entries: Vec<FeedEntry>) -> Result<()> {
        self.send(SessionMessage::Feed(entries))
    }
}

/// Composition root.
pub struct Session {
    config: SessionConfig,
    store: GridStore,
    ingestor: Ingestor,
    viewport: ViewportController,
    tiles: TileController,
    minimap: MinimapProjector,
    aggregates: AggregateBook,
    inbox_tx: Option<mpsc::UnboundedSender<SessionMessage>>,
    inbox_rx: mpsc::UnboundedReceiver<SessionMessage>,
    view_rx: Option<watch::Receiver<ViewportState>>,
    tasks: Vec<JoinHandle<()>>,
    disposed: bool,
}

impl Session {
    /// Build a session over `grid`. Summaries are refreshed only when a
    /// `summaries` source is given.
    pub fn new(
        config: SessionConfig,
        grid: Arc<dyn GridSource>,
        summaries: Option<Arc<dyn SummarySource>>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let mut ingestor = Ingestor::new(config.ingest.clone(), grid);
        if let Some(source) = summaries {
            // Weak so refreshes never keep the inbox open on their own.
            let weak = inbox_tx.downgrade();
            let sink: SummarySink = Arc::new(move |summary| {
                if let Some(tx) = weak.upgrade() {
                    let _ = tx.send(SessionMessage::Summary(summary));
                }
            });
            ingestor = ingestor.with_refresher(RefreshScheduler::new(source, sink));
        }

        let viewport = ViewportController::new(config.view.clone());
        let view_rx = viewport.subscribe().ok();
        let tiles = TileController::new(&config.view);
        let minimap = MinimapProjector::new(&config.view);

        Self {
            config,
            store: GridStore::new(),
            ingestor,
            viewport,
            tiles,
            minimap,
            aggregates: AggregateBook::new(),
            inbox_tx: Some(inbox_tx),
            inbox_rx,
            view_rx,
            tasks: Vec::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &GridStore {
        &self.store
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn tiles(&self) -> &TileController {
        &self.tiles
    }

    pub fn minimap(&self) -> &MinimapProjector {
        &self.minimap
    }

    pub fn aggregates(&self) -> &AggregateBook {
        &self.aggregates
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// A sender for feed producers. Fails once the inbox is closed.
    pub fn handle(&self) -> Result<SessionHandle> {
        self.inbox_tx
            .clone()
            .map(|tx| SessionHandle { tx })
            .ok_or(Error::InboxClosed)
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Create the render surface and frame the world.
    pub async fn attach(&mut self, host: &dyn SurfaceHost) -> Result<()> {
        self.viewport.attach(host).await?;
        self.tiles.load_all(&self.store);
        self.sync_minimap();
        Ok(())
    }

    /// Fetch and apply the snapshot inline.
    pub async fn load_snapshot(&mut self) -> Result<IngestReport> {
        let report = self.ingestor.load_snapshot(&mut self.store).await?;
        self.tiles.sync_colors(&self.store, &report.changed);
        Ok(report)
    }

    /// Fetch the snapshot on a background task; the result arrives through
    /// the inbox.
    pub fn request_snapshot(&mut self) -> Result<()> {
        let tx = self.inbox_tx.clone().ok_or(Error::InboxClosed)?;
        let runtime = Handle::try_current().map_err(|_| {
            Error::Ingest(tessera_ingest::Error::TransientFetch(
                "no async runtime for snapshot fetch".into(),
            ))
        })?;
        self.ingestor.begin_snapshot();
        let source = self.ingestor.source();
        self.track(runtime.spawn(async move {
            let result = source.fetch_snapshot().await;
            let _ = tx.send(SessionMessage::Snapshot(result));
        }));
        Ok(())
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|t| !t.is_finished());
        self.tasks.push(task);
    }

    // ------------------------------------------------------------------
    // Inbox
    // ------------------------------------------------------------------

    fn handle_message(&mut self, message: SessionMessage) -> Result<()> {
        if self.disposed {
            debug!("message after dispose discarded");
            return Ok(());
        }
        let report = match message {
            SessionMessage::Feed(entries) => self.ingestor.ingest_live(&mut self.store, entries)?,
            SessionMessage::RawFeed(values) => self.ingestor.ingest_raw(&mut self.store, values)?,
            SessionMessage::Snapshot(result) => {
                self.ingestor.apply_snapshot(&mut self.store, result)?
            }
            SessionMessage::History { cell, result } => {
                self.ingestor.apply_history(&mut self.store, cell, result)?
            }
            SessionMessage::Summary(summary) => {
                debug!(address = %summary.address, "summary refreshed");
                self.aggregates.upsert(summary);
                return Ok(());
            }
        };
        self.tiles.sync_colors(&self.store, &report.changed);
        Ok(())
    }

    fn drain_one(&mut self, message: SessionMessage) {
        // Failures are per message; the loop keeps going.
        if let Err(e) = self.handle_message(message) {
            warn!(error = %e, "session message failed");
        }
    }

    /// Apply everything currently queued. Returns how many messages ran.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.inbox_rx.try_recv() {
            self.drain_one(message);
            handled += 1;
        }
        self.sync_minimap();
        handled
    }

    /// Apply messages until every producer has gone away.
    ///
    /// The session's own sender is released first, so the loop ends once
    /// all [`SessionHandle`]s and in-flight fetches are dropped.
    pub async fn run(&mut self) {
        self.inbox_tx = None;
        info!("session loop started");
        while let Some(message) = self.inbox_rx.recv().await {
            self.drain_one(message);
            self.sync_minimap();
        }
        info!("session loop finished");
    }

    /// Apply one feed delivery directly, bypassing the inbox.
    pub fn ingest_feed(&mut self, entries: Vec<FeedEntry>) -> Result<IngestReport> {
        let report = self.ingestor.ingest_live(&mut self.store, entries)?;
        self.tiles.sync_colors(&self.store, &report.changed);
        Ok(report)
    }

    /// Decode and apply one raw feed delivery directly.
    pub fn ingest_raw(&mut self, values: Vec<Value>) -> Result<IngestReport> {
        let report = self.ingestor.ingest_raw(&mut self.store, values)?;
        self.tiles.sync_colors(&self.store, &report.changed);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Press and select the cell under `screen`, fetching its history if
    /// needed. Off-grid points, and any point before the viewport is
    /// ready, change nothing.
    pub fn pointer_down(&mut self, screen: DVec2, now: Instant) -> Option<CellId> {
        if !self.viewport.is_ready() {
            debug!("pointer down before the viewport is ready ignored");
            return None;
        }
        let state = self.viewport.state();
        let cell = self.tiles.pointer_down(&state, screen, now)?;
        self.request_history(cell);
        Some(cell)
    }

    pub fn pointer_move(&mut self, screen: DVec2) {
        if !self.viewport.is_ready() {
            return;
        }
        let state = self.viewport.state();
        self.tiles.pointer_move(&state, screen);
    }

    pub fn pointer_leave(&mut self) {
        self.tiles.pointer_leave();
    }

    /// Select `cell` and fetch its history if needed.
    pub fn select(&mut self, cell: CellId) -> Result<()> {
        self.store.get_by_id(cell)?;
        self.tiles.select(cell);
        self.request_history(cell);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.tiles.clear_selection();
    }

    /// Start a background history fetch unless one ran already. Returns
    /// whether a fetch was started.
    pub fn request_history(&mut self, cell: CellId) -> bool {
        if self.disposed || !self.ingestor.begin_history(cell) {
            return false;
        }
        let (Some(tx), Ok(runtime)) = (self.inbox_tx.clone(), Handle::try_current()) else {
            warn!(%cell, "cannot fetch history without a runtime and an open inbox");
            let failed = Err(tessera_ingest::Error::TransientFetch("fetch not started".into()));
            let _ = self.ingestor.apply_history(&mut self.store, cell, failed);
            return false;
        };
        let source = self.ingestor.source();
        self.track(runtime.spawn(async move {
            let result = source.fetch_history(cell).await;
            let _ = tx.send(SessionMessage::History { cell, result });
        }));
        true
    }

    /// Fetch `cell`'s history inline unless it was already fetched.
    pub async fn ensure_history(&mut self, cell: CellId) -> Result<Option<IngestReport>> {
        let report = self.ingestor.ensure_history(&mut self.store, cell).await?;
        if let Some(r) = &report {
            self.tiles.sync_colors(&self.store, &r.changed);
        }
        Ok(report)
    }

    /// Detail for the current selection, if any.
    pub fn selection_detail(&self) -> Result<Option<SelectionDetail>> {
        self.tiles
            .selected()
            .map(|cell| {
                SelectionDetail::build(
                    &self.store,
                    self.ingestor.history(),
                    &self.aggregates,
                    cell,
                    self.config.history_colors,
                )
            })
            .transpose()
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.viewport.pan(dx, dy);
        self.sync_minimap();
    }

    pub fn zoom_by(&mut self, factor: f64, pivot: Option<DVec2>) {
        self.viewport.zoom_by(factor, pivot);
        self.sync_minimap();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.sync_minimap();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.sync_minimap();
    }

    pub fn wheel(&mut self, delta_y: f64, pivot: DVec2) {
        self.viewport.wheel(delta_y, pivot);
        self.sync_minimap();
    }

    pub fn drag_start(&mut self, at: DVec2, now: Instant) {
        self.viewport.drag_start(at, now);
    }

    pub fn drag_move(&mut self, at: DVec2, now: Instant) {
        self.viewport.drag_move(at, now);
        self.sync_minimap();
    }

    pub fn drag_end(&mut self, now: Instant) {
        self.viewport.drag_end(now);
    }

    pub fn pinch_start(&mut self, a: DVec2, b: DVec2) {
        self.viewport.pinch_start(a, b);
    }

    pub fn pinch_move(&mut self, a: DVec2, b: DVec2) {
        self.viewport.pinch_move(a, b);
        self.sync_minimap();
    }

    pub fn pinch_end(&mut self) {
        self.viewport.pinch_end();
    }

    pub fn resize(&mut self, width: f64, height: f64, now: Instant) {
        self.viewport.resize(width, height, now);
    }

    /// Navigate to the world point under an overview click.
    pub fn minimap_click(&mut self, p: DVec2) -> bool {
        match self.minimap.overview_to_world(p) {
            Some(world) => {
                self.viewport.center_on(world);
                self.sync_minimap();
                true
            }
            None => false,
        }
    }

    /// Advance timers by one frame.
    pub fn tick(&mut self, now: Instant) {
        if self.disposed {
            return;
        }
        self.viewport.tick(now);
        self.tiles.tick(now);
        self.sync_minimap();
    }

    // Recompute the overview overlay if the viewport published a change.
    fn sync_minimap(&mut self) {
        let Some(rx) = self.view_rx.as_mut() else {
            return;
        };
        if rx.has_changed().unwrap_or(false) {
            let state = *rx.borrow_and_update();
            self.minimap.update(&state);
        }
    }

    /// Current overview overlay.
    pub fn minimap_overlay(&self) -> Rect {
        self.minimap.overlay()
    }

    /// Drain tile repaint records.
    pub fn take_repaints(&mut self) -> Vec<(CellId, TileAppearance)> {
        self.tiles.take_dirty()
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Stop everything: timers, background tasks and the inbox.
    /// Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.viewport.dispose();
        self.tiles.dispose();
        self.ingestor.shutdown();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.inbox_tx = None;
        self.view_rx = None;
        info!("session disposed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("version", &self.store.version())
            .field("lifecycle", self.viewport.lifecycle())
            .field("selected", &self.tiles.selected())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
