//! Session configuration.

use tessera_ingest::IngestConfig;
use tessera_view::{PresentationMode, ViewConfig};

/// Colors shown in the selection's recent-history strip.
pub const HISTORY_COLORS: usize = 5;

/// Everything a session needs to be built.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub view: ViewConfig,
    pub ingest: IngestConfig,
    /// Length of the recent-colors strip in the selection detail.
    pub history_colors: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            ingest: IngestConfig::default(),
            history_colors: HISTORY_COLORS,
        }
    }
}

impl SessionConfig {
    /// Defaults with the framing of `mode`.
    pub fn for_mode(mode: PresentationMode) -> Self {
        Self {
            view: ViewConfig::for_mode(mode),
            ..Self::default()
        }
    }
}
