//! View configuration.
//!
//! Every tunable has a `pub const` default; [`ViewConfig::default`] is built
//! from them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use tessera_grid::{HEIGHT, WIDTH};

/// Edge length of one cell in world units (pixels at scale 1).
pub const CELL_SIZE: f64 = 32.0;

/// Quiet period after the last resize before the transform is recomputed.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(100);

/// How long the pressed visual lasts after pointer-down.
pub const PRESS_FEEDBACK: Duration = Duration::from_millis(500);

/// Relative zoom applied by the zoom buttons.
pub const ZOOM_STEP: f64 = 0.2;

/// Wheel delta to zoom exponent.
pub const WHEEL_SENSITIVITY: f64 = 0.002;

/// Pan distance per pointer pixel.
pub const PAN_SENSITIVITY: f64 = 1.0;

/// Fraction of the finger distance ratio applied to the zoom.
pub const PINCH_SENSITIVITY: f64 = 1.0;

/// Velocity kept per 16 ms frame while gliding after a drag.
pub const INERTIA_FRICTION: f64 = 0.95;

/// Glide stops below this speed, in pixels per millisecond.
pub const INERTIA_MIN_SPEED: f64 = 0.01;

/// Reference frame length for friction and the glide timer.
pub const FRAME: Duration = Duration::from_millis(16);

/// Overview surface edge length in pixels.
pub const MINIMAP_SIZE: f64 = 200.0;

/// World width in world units.
pub const WORLD_WIDTH: f64 = WIDTH as f64 * CELL_SIZE;

/// World height in world units.
pub const WORLD_HEIGHT: f64 = HEIGHT as f64 * CELL_SIZE;

/// The two framing presets used by the grid screens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationMode {
    /// Small framing with a tight zoom range; the main grid screen.
    #[default]
    Compact,
    /// Larger framing that allows deep zoom.
    Focus,
}

impl PresentationMode {
    /// Fraction of the fitted scale used for the initial framing.
    pub const fn padding(self) -> f64 {
        match self {
            PresentationMode::Compact => 0.45,
            PresentationMode::Focus => 0.8,
        }
    }

    /// `(min_scale, max_scale)`.
    pub const fn scale_range(self) -> (f64, f64) {
        match self {
            PresentationMode::Compact => (0.1, 3.0),
            PresentationMode::Focus => (0.1, 10.0),
        }
    }
}

impl std::str::FromStr for PresentationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(PresentationMode::Compact),
            "focus" => Ok(PresentationMode::Focus),
            other => Err(format!("unknown presentation mode: {other}")),
        }
    }
}

/// How the origin is constrained after a move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CenteringPolicy {
    /// No constraint; the world may be dragged off screen.
    #[default]
    Free,
    /// Center an axis when the world fits, otherwise keep the screen covered.
    Contain,
}

/// Viewport and interaction tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub cell_size: f64,
    pub padding: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub centering: CenteringPolicy,
    pub resize_debounce: Duration,
    pub press_feedback: Duration,
    pub zoom_step: f64,
    pub wheel_sensitivity: f64,
    pub pan_sensitivity: f64,
    pub pinch_sensitivity: f64,
    pub friction: f64,
    pub min_inertia_speed: f64,
    pub frame: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self::for_mode(PresentationMode::default())
    }
}

impl ViewConfig {
    /// Defaults with the framing and zoom range of `mode`.
    pub fn for_mode(mode: PresentationMode) -> Self {
        let (min_scale, max_scale) = mode.scale_range();
        Self {
            cell_size: CELL_SIZE,
            padding: mode.padding(),
            min_scale,
            max_scale,
            centering: CenteringPolicy::default(),
            resize_debounce: RESIZE_DEBOUNCE,
            press_feedback: PRESS_FEEDBACK,
            zoom_step: ZOOM_STEP,
            wheel_sensitivity: WHEEL_SENSITIVITY,
            pan_sensitivity: PAN_SENSITIVITY,
            pinch_sensitivity: PINCH_SENSITIVITY,
            friction: INERTIA_FRICTION,
            min_inertia_speed: INERTIA_MIN_SPEED,
            frame: FRAME,
        }
    }

    pub fn with_centering(mut self, centering: CenteringPolicy) -> Self {
        self.centering = centering;
        self
    }

    pub fn world_width(&self) -> f64 {
        WIDTH as f64 * self.cell_size
    }

    pub fn world_height(&self) -> f64 {
        HEIGHT as f64 * self.cell_size
    }

    /// Clamp a scale into the configured range.
    pub fn clamp_scale(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_match_presets() {
        let compact = ViewConfig::for_mode(PresentationMode::Compact);
        assert_eq!(compact.padding, 0.45);
        assert_eq!(compact.max_scale, 3.0);
        let focus = ViewConfig::for_mode(PresentationMode::Focus);
        assert_eq!(focus.padding, 0.8);
        assert_eq!(focus.max_scale, 10.0);
        assert_eq!(focus.world_width(), WORLD_WIDTH);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Focus".parse::<PresentationMode>(), Ok(PresentationMode::Focus));
        assert!("huge".parse::<PresentationMode>().is_err());
    }
}
