//! Tessera Session
//!
//! Wires the grid store, the event ingestor and the view controllers into
//! one [`Session`] with a single writer.
//!
//! ```text
//!  feed / fetch tasks ──► SessionHandle ──► inbox ──► Session::pump / run
//!                                                      │
//!                      GridStore ◄── Ingestor ◄────────┘
//!                          │
//!              TileController, MinimapProjector ◄── ViewportController
//! ```
//!
//! The [`replay`] module drives a session from a recorded JSON fixture and
//! backs the `tessera-replay` binary.

mod config;
mod detail;
mod error;
mod session;

pub mod replay;

pub use config::{SessionConfig, HISTORY_COLORS};
pub use detail::SelectionDetail;
pub use error::{Error, Result};
pub use session::{Session, SessionHandle, SessionMessage};
