//! Deterministic replay of a recorded fixture through a full session.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use tessera_grid::{CellId, Color};
use tessera_ingest::{
    GridSource, HistoryRecord, MemorySource, SnapshotRecord, SummaryRecord, SummarySource,
};
use tessera_view::{DVec2, PresentationMode, SurfaceHost};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::session::Session;

/// One recorded input gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Gesture {
    Pan { dx: f64, dy: f64 },
    Zoom { factor: f64 },
    ZoomIn,
    ZoomOut,
    Wheel { delta_y: f64, x: f64, y: f64 },
    Click { x: f64, y: f64 },
    Resize { width: f64, height: f64 },
    MinimapClick { x: f64, y: f64 },
}

/// Recorded upstream data plus the interaction to replay over it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub snapshot: Vec<SnapshotRecord>,
    /// History pages keyed by cell id.
    pub history: BTreeMap<u32, Vec<HistoryRecord>>,
    pub summaries: Vec<SummaryRecord>,
    /// Live feed deliveries, each applied as one batch.
    pub feed: Vec<Vec<Value>>,
    /// Surface size; 800x600 when absent.
    pub screen: Option<[f64; 2]>,
    pub gestures: Vec<Gesture>,
    /// Cell to select at the end.
    pub select: Option<u32>,
}

impl Fixture {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| Error::Fixture(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Fixture(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }
}

/// The selected cell as it ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    pub cell: CellId,
    pub color: String,
    pub owner: String,
    pub stake: String,
    pub share_percent: f64,
    pub control_count: usize,
    pub recent_colors: Vec<String>,
}

/// Final state of a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub version: u64,
    pub owned_cells: usize,
    pub total_stake: String,
    pub dropped: usize,
    pub scale: f64,
    pub origin: [f64; 2],
    pub overlay: [f64; 4],
    pub selection: Option<SelectionReport>,
}

struct FixedHost(DVec2);

#[async_trait::async_trait]
impl SurfaceHost for FixedHost {
    async fn create_surface(&self) -> tessera_view::Result<DVec2> {
        Ok(self.0)
    }
}

async fn seed(fixture: &Fixture) -> Result<MemorySource> {
    let source = MemorySource::new();
    source.set_snapshot(fixture.snapshot.clone()).await;
    for (&id, rows) in &fixture.history {
        source.set_history(CellId(id), rows.clone()).await;
    }
    for rec in &fixture.summaries {
        let address = tessera_grid::Address::parse(&rec.address)?;
        source.set_summary(address, rec.clone()).await;
    }
    Ok(source)
}

/// Run `fixture` through a fresh session and report where it ended up.
///
/// Summary refreshes run without the settle delay so the report sees
/// them.
pub async fn replay(fixture: &Fixture, mode: PresentationMode) -> Result<ReplayReport> {
    let source = seed(fixture).await?;
    let mut config = SessionConfig::for_mode(mode);
    config.ingest.settle_delay = Duration::ZERO;

    let grid: Arc<dyn GridSource> = Arc::new(source.clone());
    let summaries: Arc<dyn SummarySource> = Arc::new(source);
    let mut session = Session::new(config, grid, Some(summaries));

    let [w, h] = fixture.screen.unwrap_or([800.0, 600.0]);
    session.attach(&FixedHost(DVec2::new(w, h))).await?;
    let snapshot = session.load_snapshot().await?;
    let mut dropped = snapshot.dropped;

    for batch in &fixture.feed {
        let report = session.ingest_raw(batch.clone())?;
        dropped += report.dropped;
    }

    let mut now = Instant::now();
    for gesture in &fixture.gestures {
        debug!(?gesture, "replaying gesture");
        match *gesture {
            Gesture::Pan { dx, dy } => session.pan(dx, dy),
            Gesture::Zoom { factor } => session.zoom_by(factor, None),
            Gesture::ZoomIn => session.zoom_in(),
            Gesture::ZoomOut => session.zoom_out(),
            Gesture::Wheel { delta_y, x, y } => session.wheel(delta_y, DVec2::new(x, y)),
            Gesture::Click { x, y } => {
                session.pointer_down(DVec2::new(x, y), now);
            }
            Gesture::Resize { width, height } => {
                session.resize(width, height, now);
                now += session.config().view.resize_debounce;
            }
            Gesture::MinimapClick { x, y } => {
                session.minimap_click(DVec2::new(x, y));
            }
        }
        session.tick(now);
    }

    if let Some(id) = fixture.select {
        let cell = CellId(id);
        session.ensure_history(cell).await?;
        session.select(cell)?;
    }

    // Let zero-delay refreshes and click-triggered fetches land.
    tokio::time::sleep(Duration::from_millis(10)).await;
    session.pump();

    let report = build_report(&session, dropped)?;
    info!(version = report.version, owned = report.owned_cells, "replay finished");
    session.dispose();
    Ok(report)
}

fn build_report(session: &Session, dropped: usize) -> Result<ReplayReport> {
    let store = session.store();
    let state = session.viewport().state();
    let overlay = session.minimap_overlay();
    let selection = session.selection_detail()?.map(|d| SelectionReport {
        cell: d.cell.id,
        color: d.cell.color.to_hex_string(),
        owner: d.cell.owner.to_string(),
        stake: d.cell.stake.to_string(),
        share_percent: d.share_percent,
        control_count: d.control_count,
        recent_colors: d.recent_colors.iter().map(Color::to_hex_string).collect(),
    });

    Ok(ReplayReport {
        version: store.version(),
        owned_cells: store.get_all().iter().filter(|c| !c.owner.is_zero()).count(),
        total_stake: store.total_stake().to_string(),
        dropped,
        scale: state.scale,
        origin: state.origin.to_array(),
        overlay: [overlay.min.x, overlay.min.y, overlay.size.x, overlay.size.y],
        selection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "snapshot": [
            {"id": 0, "color": 16711680, "stake_amount": "2000000000000000000",
             "owner": "0x00000000000000000000000000000000000000a1"}
        ],
        "feed": [[
            {"eventName": "PixelStaked", "blockTimestamp": 1700000000,
             "transactionHash": "0x01", "logIndex": 0,
             "args": {"staker": "0x00000000000000000000000000000000000000b2",
                      "pixelId": 1, "amount": "2000000000000000000", "color": 255}},
            {"eventName": "Bogus", "blockTimestamp": 1700000000,
             "transactionHash": "0x02", "logIndex": 1, "args": {}}
        ]],
        "gestures": [{"kind": "zoom_in"}, {"kind": "pan", "dx": 10, "dy": 0}],
        "select": 1
    }"#;

    #[tokio::test]
    async fn replay_applies_snapshot_feed_and_selection() {
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        let report = replay(&fixture, PresentationMode::Focus).await.unwrap();
        assert_eq!(report.owned_cells, 2);
        assert_eq!(report.dropped, 1);
        let sel = report.selection.unwrap();
        assert_eq!(sel.cell, CellId(1));
        assert_eq!(sel.color, "#0000ff");
        assert_eq!(sel.share_percent, 50.0);
        assert_eq!(sel.control_count, 1);
    }

    #[test]
    fn bad_fixture_is_reported() {
        assert!(matches!(Fixture::from_json("{\"gestures\": 3}"), Err(Error::Fixture(_))));
    }
}
