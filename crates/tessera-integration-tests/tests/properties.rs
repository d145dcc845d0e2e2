//! Property tests for store ordering, stake accounting and view math.

use proptest::prelude::*;

use tessera_grid::{CellEvent, CellId, GridStore, Stake, CELL_COUNT};
use tessera_integration_tests::{full_event, key};
use tessera_view::{
    DVec2, PresentationMode, TileController, ViewConfig, ViewportController, ViewportState, Visual,
};

/// Events over a handful of cells, each with a distinct order key.
fn arb_batch() -> impl Strategy<Value = Vec<CellEvent>> {
    prop::collection::vec(
        (0u32..16, 0i64..50, 1u8..4, 0u32..=0xFF_FF_FF, 0u128..1_000_000),
        1..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (cell, secs, owner, color, stake))| {
                full_event(cell, key(secs, i as u32), owner, color, stake)
            })
            .collect()
    })
}

fn ready_viewport(config: ViewConfig, w: f64, h: f64) -> ViewportController {
    let mut vp = ViewportController::new(config);
    let ticket = vp.begin_attach().unwrap().unwrap();
    vp.finish_attach(ticket, Ok(DVec2::new(w, h))).unwrap();
    vp
}

proptest! {
    #[test]
    fn applying_a_batch_twice_is_a_noop(batch in arb_batch()) {
        let mut once = GridStore::new();
        once.apply_event_batch(batch.clone()).unwrap();

        let mut twice = GridStore::new();
        twice.apply_event_batch(batch.clone()).unwrap();
        let second = twice.apply_event_batch(batch).unwrap();

        prop_assert!(second.changed.is_empty());
        prop_assert_eq!(once.get_all(), twice.get_all());
    }

    #[test]
    fn arrival_order_does_not_matter(batch in arb_batch().prop_flat_map(|b| {
        let shuffled = Just(b.clone()).prop_shuffle();
        (Just(b), shuffled)
    })) {
        let (in_order, shuffled) = batch;
        let mut a = GridStore::new();
        a.apply_event_batch(in_order.clone()).unwrap();

        let mut b = GridStore::new();
        b.apply_event_batch(shuffled).unwrap();

        // Splitting into single-event batches must not matter either.
        let mut c = GridStore::new();
        for ev in in_order.into_iter().rev() {
            c.apply_event_batch([ev]).unwrap();
        }

        prop_assert_eq!(a.get_all(), b.get_all());
        prop_assert_eq!(a.get_all(), c.get_all());
    }

    #[test]
    fn total_stake_is_the_sum_of_cells(batch in arb_batch(), delta in 1u128..1_000_000) {
        let mut store = GridStore::new();
        store.apply_event_batch(batch).unwrap();

        let sum: u128 = store.get_all().iter().map(|c| c.stake.base_units()).sum();
        prop_assert_eq!(store.total_stake().base_units(), sum);

        let target = CellId(3);
        let current = store.get_by_id(target).unwrap().stake.base_units();
        let bump = CellEvent::new(target, key(10_000, 0), tessera_grid::TxHash::zero())
            .with_stake(Stake::from_base_units(current + delta));
        store.apply_event_batch([bump]).unwrap();
        prop_assert_eq!(store.total_stake().base_units(), sum + delta);
    }

    #[test]
    fn screen_world_round_trip(
        scale in 0.05f64..10.0,
        ox in -5_000.0f64..5_000.0,
        oy in -5_000.0f64..5_000.0,
        px in 0.0f64..1_920.0,
        py in 0.0f64..1_080.0,
    ) {
        let state = ViewportState {
            scale,
            origin: DVec2::new(ox, oy),
            screen: DVec2::new(1_920.0, 1_080.0),
        };
        let p = DVec2::new(px, py);
        let back = state.world_to_screen(state.screen_to_world(p));
        prop_assert!((back - p).length() < 1e-6);
    }

    #[test]
    fn zoom_stays_within_bounds(
        focus in any::<bool>(),
        factors in prop::collection::vec(0.01f64..50.0, 1..30),
    ) {
        let mode = if focus { PresentationMode::Focus } else { PresentationMode::Compact };
        let config = ViewConfig::for_mode(mode);
        let (min, max) = (config.min_scale, config.max_scale);
        let mut vp = ready_viewport(config, 1_280.0, 720.0);
        for f in factors {
            vp.zoom_by(f, Some(DVec2::new(100.0, 100.0)));
            let s = vp.state().scale;
            prop_assert!(s >= min && s <= max);
        }
    }

    #[test]
    fn exactly_one_cell_is_selected(picks in prop::collection::vec(0u32..CELL_COUNT as u32, 1..20)) {
        let mut tiles = TileController::new(&ViewConfig::default());
        for &id in &picks {
            tiles.select(CellId(id));
        }
        let last = CellId(*picks.last().unwrap());
        let selected = CellId::all()
            .filter(|&c| tiles.visual(c) == Visual::Selected)
            .collect::<Vec<_>>();
        prop_assert_eq!(selected, vec![last]);
    }
}
