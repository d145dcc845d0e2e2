//! Overview surface with a visible-area overlay.
//!
//! The overview draws every cell as a small static checkerboard tile once.
//! Only the overlay rectangle follows the viewport, and it is a linear
//! function of the viewport state, so each update is O(1).

use glam::DVec2;

use tessera_grid::{CellId, Color, HEIGHT, WIDTH};

use crate::config::{ViewConfig, MINIMAP_SIZE};
use crate::transform::ViewportState;

/// Light checkerboard square.
pub const CHECKER_LIGHT: Color = Color::from_rgb(0x33, 0x33, 0x33);

/// Dark checkerboard square.
pub const CHECKER_DARK: Color = Color::from_rgb(0x22, 0x22, 0x22);

/// Axis-aligned rectangle in overview pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub min: DVec2,
    pub size: DVec2,
}

impl Rect {
    pub fn max(&self) -> DVec2 {
        self.min + self.size
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.cmpge(self.min).all() && p.cmplt(self.max()).all()
    }
}

/// Projects the viewport onto the overview surface.
///
/// The grid is scaled to fit the surface's longer grid axis, so one
/// overview tile is `size / max(WIDTH, HEIGHT)` pixels.
#[derive(Debug, Clone)]
pub struct MinimapProjector {
    size: f64,
    tile: f64,
    cell_size: f64,
    overlay: Rect,
}

impl MinimapProjector {
    pub fn new(config: &ViewConfig) -> Self {
        Self::with_size(config, MINIMAP_SIZE)
    }

    pub fn with_size(config: &ViewConfig, size: f64) -> Self {
        Self {
            size,
            tile: size / WIDTH.max(HEIGHT) as f64,
            cell_size: config.cell_size,
            overlay: Rect::default(),
        }
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    /// Overview pixels per cell.
    pub fn tile(&self) -> f64 {
        self.tile
    }

    /// Overview pixels per world unit.
    pub fn overview_scale(&self) -> f64 {
        self.tile / self.cell_size
    }

    /// Where the drawn grid sits inside the overview surface.
    pub fn grid_rect(&self) -> Rect {
        let grid = DVec2::new(WIDTH as f64, HEIGHT as f64) * self.tile;
        Rect {
            min: (DVec2::splat(self.size) - grid) * 0.5,
            size: grid,
        }
    }

    /// The static overview tiles, drawn once.
    pub fn tiles(&self) -> impl Iterator<Item = (CellId, Color)> {
        CellId::all().map(|id| {
            let color = if (id.x() + id.y()) % 2 == 0 {
                CHECKER_LIGHT
            } else {
                CHECKER_DARK
            };
            (id, color)
        })
    }

    /// Visible world area in overview pixels.
    pub fn project(&self, view: &ViewportState) -> Rect {
        let (world_min, world_size) = view.visible_world();
        let k = self.overview_scale();
        Rect {
            min: self.grid_rect().min + world_min * k,
            size: world_size * k,
        }
    }

    /// Recompute the overlay for a new viewport state.
    pub fn update(&mut self, view: &ViewportState) -> Rect {
        self.overlay = self.project(view);
        self.overlay
    }

    /// Last computed overlay.
    pub fn overlay(&self) -> Rect {
        self.overlay
    }

    /// World point under an overview click; `None` off the drawn grid.
    pub fn overview_to_world(&self, p: DVec2) -> Option<DVec2> {
        let grid = self.grid_rect();
        if !grid.contains(p) {
            return None;
        }
        Some((p - grid.min) / self.overview_scale())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(scale: f64, origin: DVec2, screen: DVec2) -> ViewportState {
        ViewportState {
            scale,
            origin,
            screen,
        }
    }

    #[test]
    fn whole_world_view_fills_overview() {
        let mini = MinimapProjector::new(&ViewConfig::default());
        let r = mini.project(&view(0.25, DVec2::ZERO, DVec2::splat(800.0)));
        assert_eq!(r.min, DVec2::ZERO);
        assert_eq!(r.size, DVec2::splat(200.0));
    }

    #[test]
    fn overlay_tracks_pan_and_scale() {
        let mini = MinimapProjector::new(&ViewConfig::default());
        let r = mini.project(&view(1.0, DVec2::new(-320.0, -640.0), DVec2::new(800.0, 600.0)));
        assert_eq!(r.min, DVec2::new(20.0, 40.0));
        assert_eq!(r.size, DVec2::new(50.0, 37.5));
    }

    #[test]
    fn checkerboard_alternates() {
        let mini = MinimapProjector::new(&ViewConfig::default());
        let tiles: Vec<_> = mini.tiles().take(2).collect();
        assert_eq!(tiles[0].1, CHECKER_LIGHT);
        assert_eq!(tiles[1].1, CHECKER_DARK);
        assert_eq!(mini.tiles().count(), 10_000);
    }

    #[test]
    fn overview_click_maps_to_world() {
        let mini = MinimapProjector::new(&ViewConfig::default());
        assert_eq!(mini.overview_to_world(DVec2::new(100.0, 50.0)), Some(DVec2::new(1600.0, 800.0)));
        assert_eq!(mini.overview_to_world(DVec2::new(200.0, 5.0)), None);
    }

    #[test]
    fn overview_scale_follows_surface_size() {
        let cfg = ViewConfig::default();
        let mini = MinimapProjector::with_size(&cfg, 240.0);
        assert!((mini.tile() - 2.4).abs() < 1e-12);
        assert!((mini.overview_scale() - 240.0 / 3_200.0).abs() < 1e-12);
        assert_eq!(mini.grid_rect().min, DVec2::ZERO);

        let whole = mini.project(&view(0.25, DVec2::ZERO, DVec2::splat(800.0)));
        assert!((whole.size - DVec2::splat(240.0)).length() < 1e-9);
        let back = mini.overview_to_world(DVec2::new(120.0, 60.0)).unwrap();
        assert!((back - DVec2::new(1_600.0, 800.0)).length() < 1e-9);
    }
}
