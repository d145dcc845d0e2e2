//! Tile interaction: hover, press and selection visuals plus hit-testing.
//!
//! The controller owns one private tile handle per cell and never exposes
//! them; the renderer drains `(CellId, TileAppearance)` repaint records with
//! [`TileController::take_dirty`].

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use glam::DVec2;
use tracing::debug;

use tessera_grid::{CellId, Color, GridStore, CELL_COUNT, HEIGHT, WIDTH};

use crate::config::ViewConfig;
use crate::timer::TimerQueue;
use crate::transform::ViewportState;

/// Border drawn around the selected tile.
pub const SELECTION_BORDER: Color = Color::from_rgb(0xE2, 0xB7, 0x14);

/// Border drawn around the hovered tile.
pub const HOVER_BORDER: Color = Color::from_rgb(0x2C, 0x2E, 0x31);

/// Fill shown while a tile is pressed.
pub const PRESS_FILL: Color = Color::from_rgb(0x66, 0x66, 0x66);

/// Which visual state wins for a tile, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Visual {
    Plain,
    Hovered,
    Selected,
    Pressed,
}

/// What the renderer should draw for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAppearance {
    pub fill: Color,
    pub border: Option<Color>,
    pub visual: Visual,
}

#[derive(Debug, Clone, Copy)]
struct TileHandle {
    color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileTimer {
    PressRelease,
}

/// Hover/press/selection state over the grid.
#[derive(Debug)]
pub struct TileController {
    tiles: Vec<TileHandle>,
    cell_size: f64,
    press_feedback: Duration,
    hovered: Option<CellId>,
    pressed: Option<CellId>,
    selected: Option<CellId>,
    dirty: BTreeSet<CellId>,
    timers: TimerQueue<TileTimer>,
}

impl TileController {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            tiles: vec![TileHandle { color: Color::BLACK }; CELL_COUNT],
            cell_size: config.cell_size,
            press_feedback: config.press_feedback,
            hovered: None,
            pressed: None,
            selected: None,
            dirty: BTreeSet::new(),
            timers: TimerQueue::new(),
        }
    }

    /// Cell under a screen point, if any.
    pub fn hit_test(&self, view: &ViewportState, screen: DVec2) -> Option<CellId> {
        let world = view.screen_to_world(screen);
        if !world.is_finite() {
            return None;
        }
        let x = (world.x / self.cell_size).floor();
        let y = (world.y / self.cell_size).floor();
        if x < 0.0 || y < 0.0 || x >= WIDTH as f64 || y >= HEIGHT as f64 {
            return None;
        }
        CellId::from_xy(x as u32, y as u32)
    }

    /// Press feedback shows over the selection until its timer fires.
    pub fn visual(&self, cell: CellId) -> Visual {
        if self.pressed == Some(cell) {
            Visual::Pressed
        } else if self.selected == Some(cell) {
            Visual::Selected
        } else if self.hovered == Some(cell) {
            Visual::Hovered
        } else {
            Visual::Plain
        }
    }

    /// Effective appearance of a tile.
    pub fn appearance(&self, cell: CellId) -> TileAppearance {
        let color = self
            .tiles
            .get(cell.index())
            .map_or(Color::BLACK, |t| t.color);
        let visual = self.visual(cell);
        let (fill, border) = match visual {
            Visual::Selected => (color, Some(SELECTION_BORDER)),
            Visual::Pressed => (PRESS_FILL, None),
            Visual::Hovered => (color, Some(HOVER_BORDER)),
            Visual::Plain => (color, None),
        };
        TileAppearance {
            fill,
            border,
            visual,
        }
    }

    fn touch(&mut self, cell: Option<CellId>) {
        if let Some(cell) = cell {
            self.dirty.insert(cell);
        }
    }

    // ------------------------------------------------------------------
    // Colors
    // ------------------------------------------------------------------

    /// Load every tile's base color from the store.
    pub fn load_all(&mut self, store: &GridStore) {
        for cell in store.get_all() {
            if let Some(tile) = self.tiles.get_mut(cell.id.index()) {
                tile.color = cell.color;
            }
            self.dirty.insert(cell.id);
        }
    }

    /// Refresh the base color of cells changed by a batch.
    pub fn sync_colors(&mut self, store: &GridStore, changed: &[CellId]) {
        for &id in changed {
            let Ok(cell) = store.get_by_id(id) else {
                continue;
            };
            if let Some(tile) = self.tiles.get_mut(id.index()) {
                if tile.color != cell.color {
                    tile.color = cell.color;
                    self.dirty.insert(id);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Pointer
    // ------------------------------------------------------------------

    /// Track the hovered tile. Points outside the grid clear the hover.
    pub fn pointer_move(&mut self, view: &ViewportState, screen: DVec2) {
        let hit = self.hit_test(view, screen);
        if hit != self.hovered {
            let prev = std::mem::replace(&mut self.hovered, hit);
            self.touch(prev);
            self.touch(hit);
        }
    }

    pub fn pointer_leave(&mut self) {
        let prev = self.hovered.take();
        self.touch(prev);
    }

    /// Press and select the tile under `screen`. Returns the selected cell,
    /// or `None` (and changes nothing) when the point is off the grid.
    pub fn pointer_down(&mut self, view: &ViewportState, screen: DVec2, now: Instant) -> Option<CellId> {
        let cell = self.hit_test(view, screen)?;
        let prev = self.pressed.replace(cell);
        self.touch(prev);
        self.timers
            .schedule(TileTimer::PressRelease, now + self.press_feedback);
        self.select(cell);
        Some(cell)
    }

    /// Make `cell` the only selected tile.
    pub fn select(&mut self, cell: CellId) {
        if !cell.is_valid() {
            return;
        }
        let prev = self.selected.replace(cell);
        if prev != Some(cell) {
            debug!(%cell, "tile selected");
        }
        self.touch(prev);
        self.touch(Some(cell));
    }

    pub fn clear_selection(&mut self) {
        let prev = self.selected.take();
        self.touch(prev);
    }

    pub fn selected(&self) -> Option<CellId> {
        self.selected
    }

    pub fn hovered(&self) -> Option<CellId> {
        self.hovered
    }

    pub fn pressed(&self) -> Option<CellId> {
        self.pressed
    }

    /// Fire due timers.
    pub fn tick(&mut self, now: Instant) {
        for timer in self.timers.due(now) {
            match timer {
                TileTimer::PressRelease => {
                    let prev = self.pressed.take();
                    self.touch(prev);
                }
            }
        }
    }

    /// Drain repaint records, in cell order.
    pub fn take_dirty(&mut self) -> Vec<(CellId, TileAppearance)> {
        std::mem::take(&mut self.dirty)
            .into_iter()
            .map(|id| (id, self.appearance(id)))
            .collect()
    }

    /// Cancel pending press feedback.
    pub fn dispose(&mut self) {
        self.timers.cancel_all();
        self.pressed = None;
    }
}
