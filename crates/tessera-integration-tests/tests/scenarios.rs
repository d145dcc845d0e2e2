//! End-to-end scenarios across the store, the ingestor and the view.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tessera_grid::{CellEvent, CellId, Color, GridStore, Stake, TxHash};
use tessera_ingest::{FeedEntry, GridSource, IngestConfig, Ingestor, MemorySource};
use tessera_integration_tests::{address, full_event, key, staked_json, FixedHost};
use tessera_session::{Session, SessionConfig};
use tessera_view::{DVec2, MinimapProjector, ViewConfig, ViewportController};

fn ingestor() -> Ingestor {
    let source: Arc<dyn GridSource> = Arc::new(MemorySource::new());
    let config = IngestConfig {
        refresh_owners: false,
        ..IngestConfig::default()
    };
    Ingestor::new(config, source)
}

#[test]
fn staking_a_cell_updates_it_and_the_total() {
    let mut store = GridStore::new();
    let before = store.total_stake();

    let ev = CellEvent::new(CellId(5150), key(1_000, 0), TxHash::zero())
        .with_color(Color::new(0xFF0000).unwrap())
        .with_stake(Stake::parse_base_units("1000000000000000000").unwrap());
    store.apply_event_batch([ev]).unwrap();

    let cell = store.get_by_id(CellId(5150)).unwrap();
    assert_eq!(cell.color, Color::new(0xFF0000).unwrap());
    assert_eq!(cell.stake.as_decimal(), 1.0);
    assert_eq!((cell.id.x(), cell.id.y()), (50, 51));
    assert_eq!(
        store.total_stake().base_units() - before.base_units(),
        Stake::from_tokens(1).base_units()
    );
}

#[test]
fn staking_through_the_feed_matches_direct_application() {
    let mut store = GridStore::new();
    let mut ing = ingestor();
    let report = ing
        .ingest_raw(&mut store, vec![staked_json(5150, 1_000, 0, 1, 1, 0xFF0000)])
        .unwrap();
    assert_eq!(report.changed, vec![CellId(5150)]);
    let cell = store.get_by_id(CellId(5150)).unwrap();
    assert_eq!(cell.owner, address(1));
    assert_eq!(store.total_stake(), Stake::from_tokens(1));
}

#[tokio::test]
async fn resize_refits_and_recenters() {
    let mut config = ViewConfig::default();
    config.min_scale = 0.001;
    let world = DVec2::new(config.world_width(), config.world_height());
    let padding = config.padding;

    let mut vp = ViewportController::new(config.clone());
    vp.attach(&FixedHost::new(800.0, 600.0)).await.unwrap();
    let mut mini = MinimapProjector::new(&config);
    let before = mini.update(&vp.state());

    let t0 = Instant::now();
    vp.resize(400.0, 300.0, t0);
    vp.tick(t0 + Duration::from_millis(100));

    let state = vp.state();
    let expected = (400.0 / world.x).min(300.0 / world.y) * padding;
    assert!((state.scale - expected).abs() < 1e-12);
    let center = state.world_to_screen(world * 0.5);
    assert!((center - DVec2::new(200.0, 150.0)).length() < 1e-9);

    let after = mini.update(&state);
    let k = mini.overview_scale();
    assert!((after.size - state.screen / state.scale * k).length() < 1e-9);
    // Both framings show the same world area, so the overlay keeps its
    // place; only the surface behind it shrank.
    assert!((after.size - before.size).length() < 1e-9);
    assert!((after.min - before.min).length() < 1e-9);
}

#[tokio::test]
async fn resize_with_default_bounds_clamps_and_shrinks_the_overlay() {
    let config = ViewConfig::default();
    let world = DVec2::new(config.world_width(), config.world_height());
    let min_scale = config.min_scale;

    let mut vp = ViewportController::new(config.clone());
    vp.attach(&FixedHost::new(800.0, 600.0)).await.unwrap();
    assert_eq!(vp.state().scale, min_scale);
    let mut mini = MinimapProjector::new(&config);
    let before = mini.update(&vp.state());

    let t0 = Instant::now();
    vp.resize(400.0, 300.0, t0);
    vp.tick(t0 + Duration::from_millis(100));

    // The fit wants an even smaller scale, so it stays at the lower bound.
    let state = vp.state();
    assert_eq!(state.scale, min_scale);
    let center = state.world_to_screen(world * 0.5);
    assert!((center - DVec2::new(200.0, 150.0)).length() < 1e-9);

    let after = mini.update(&state);
    let k = mini.overview_scale();
    assert!((after.size - DVec2::new(400.0, 300.0) / min_scale * k).length() < 1e-9);
    assert!((after.size * 2.0 - before.size).length() < 1e-9);
}

#[test]
fn later_key_wins_regardless_of_arrival() {
    let e1 = full_event(9, key(2_000, 5), 1, 0x00FF00, 5);
    let e2 = full_event(9, key(2_000, 3), 2, 0x0000FF, 3);

    let mut arrived = GridStore::new();
    arrived.apply_event_batch([e1.clone(), e2.clone()]).unwrap();

    let mut ordered = GridStore::new();
    ordered.apply_event_batch([e2]).unwrap();
    ordered.apply_event_batch([e1]).unwrap();

    assert_eq!(arrived.get_by_id(CellId(9)).unwrap(), ordered.get_by_id(CellId(9)).unwrap());
    assert_eq!(arrived.get_by_id(CellId(9)).unwrap().owner, address(1));
}

#[test]
fn invalid_batch_leaves_store_untouched() {
    let mut store = GridStore::new();
    store.apply_event_batch([full_event(1, key(1, 0), 1, 1, 1)]).unwrap();
    let version = store.version();
    let snapshot = store.get_all().to_vec();

    let bad = vec![
        full_event(2, key(2, 0), 1, 2, 2),
        full_event(10_000, key(2, 1), 1, 2, 2),
    ];
    assert!(store.apply_event_batch(bad).is_err());
    assert_eq!(store.version(), version);
    assert_eq!(store.get_all(), snapshot.as_slice());
}

#[test]
fn malformed_entry_does_not_abort_the_delivery() {
    let mut store = GridStore::new();
    let mut ing = ingestor();
    let mut bad = staked_json(3, 1_000, 1, 1, 1, 0xFFFFFF);
    bad["args"]["pixelId"] = serde_json::json!(10_000);

    let report = ing
        .ingest_raw(
            &mut store,
            vec![staked_json(2, 1_000, 0, 1, 1, 0x123456), bad, serde_json::json!("noise")],
        )
        .unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.dropped, 2);
    assert_eq!(store.cell_count_of(&address(1)), 1);
}

#[tokio::test]
async fn session_resize_moves_the_overlay_with_the_viewport() {
    let source: Arc<dyn GridSource> = Arc::new(MemorySource::new());
    let mut config = SessionConfig::default();
    config.view.min_scale = 0.001;
    let mut session = Session::new(config, source, None);
    session.attach(&FixedHost::new(800.0, 600.0)).await.unwrap();
    let framed = session.minimap_overlay();

    session.zoom_by(2.0, None);
    let zoomed = session.minimap_overlay();
    assert!((zoomed.size * 2.0 - framed.size).length() < 1e-9);

    let t0 = Instant::now();
    session.resize(400.0, 300.0, t0);
    session.tick(t0 + Duration::from_millis(100));
    let refit = session.minimap_overlay();
    assert!((refit.size - framed.size).length() < 1e-9);
}

#[test]
fn feed_entries_decode_from_wire_shape() {
    let entry: FeedEntry =
        serde_json::from_value(staked_json(42, 1_700_000_000, 7, 3, 2, 0xABCDEF)).unwrap();
    assert_eq!(entry.event_name, "PixelStaked");
    assert_eq!(entry.log_index, 7);
    assert_eq!(entry.order_key().unwrap(), key(1_700_000_000, 7));
}
