//! Screen/world transform.
//!
//! `screen = world * scale + origin`, where `origin` is the screen position
//! of the world's top-left corner.

use glam::DVec2;

use crate::config::{CenteringPolicy, ViewConfig};

/// The observable viewport state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub scale: f64,
    pub origin: DVec2,
    /// Screen size in pixels.
    pub screen: DVec2,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            origin: DVec2::ZERO,
            screen: DVec2::ZERO,
        }
    }
}

impl ViewportState {
    pub fn screen_to_world(&self, p: DVec2) -> DVec2 {
        (p - self.origin) / self.scale
    }

    pub fn world_to_screen(&self, w: DVec2) -> DVec2 {
        w * self.scale + self.origin
    }

    /// World point at the center of the screen.
    pub fn center_world(&self) -> DVec2 {
        self.screen_to_world(self.screen * 0.5)
    }

    /// Top-left and size of the visible world area.
    pub fn visible_world(&self) -> (DVec2, DVec2) {
        (self.screen_to_world(DVec2::ZERO), self.screen / self.scale)
    }
}

/// Scale that fits the world into `screen`, padded and clamped, with the
/// origin that centers the world.
pub fn fit(config: &ViewConfig, screen: DVec2) -> ViewportState {
    let world = DVec2::new(config.world_width(), config.world_height());
    let fitted = (screen.x / world.x).min(screen.y / world.y) * config.padding;
    let scale = config.clamp_scale(fitted);
    ViewportState {
        scale,
        origin: (screen - world * scale) * 0.5,
        screen,
    }
}

/// Apply the centering policy to `state`'s origin.
pub fn constrain(config: &ViewConfig, mut state: ViewportState) -> ViewportState {
    if config.centering == CenteringPolicy::Free {
        return state;
    }
    let world = DVec2::new(config.world_width(), config.world_height()) * state.scale;
    state.origin.x = contain_axis(state.origin.x, world.x, state.screen.x);
    state.origin.y = contain_axis(state.origin.y, world.y, state.screen.y);
    state
}

fn contain_axis(origin: f64, world: f64, screen: f64) -> f64 {
    if world <= screen {
        (screen - world) * 0.5
    } else {
        origin.clamp(screen - world, 0.0)
    }
}
