//! Tessera View
//!
//! Interactive presentation of the grid, independent of any renderer:
//!
//! - [`ViewportController`]: pan, zoom, pinch, glide and debounced resize
//!   over the world, with an explicit lifecycle and a watch channel for
//!   observers.
//! - [`TileController`]: hit-testing plus hover, press and selection
//!   visuals, emitted as repaint records.
//! - [`MinimapProjector`]: the overview surface and its visible-area
//!   overlay.
//!
//! World units are pixels at scale 1; one cell is [`CELL_SIZE`] units wide.
//! Hosts call `tick(now)` every frame; all deferred work lives in a
//! [`TimerQueue`] and runs from there.

mod config;
mod error;
mod minimap;
mod tiles;
mod timer;
mod transform;
mod viewport;

pub use config::{
    CenteringPolicy, PresentationMode, ViewConfig, CELL_SIZE, FRAME, INERTIA_FRICTION,
    INERTIA_MIN_SPEED, MINIMAP_SIZE, PAN_SENSITIVITY, PINCH_SENSITIVITY,
    PRESS_FEEDBACK, RESIZE_DEBOUNCE, WHEEL_SENSITIVITY, WORLD_HEIGHT, WORLD_WIDTH, ZOOM_STEP,
};
pub use error::{Result, SurfaceError};
pub use minimap::{MinimapProjector, Rect, CHECKER_DARK, CHECKER_LIGHT};
pub use tiles::{TileAppearance, TileController, Visual, HOVER_BORDER, PRESS_FILL, SELECTION_BORDER};
pub use timer::TimerQueue;
pub use transform::{constrain, fit, ViewportState};
pub use viewport::{AttachTicket, Lifecycle, Liveness, SurfaceHost, ViewportController};

/// Re-exported so hosts and tests share the point type.
pub use glam::DVec2;
