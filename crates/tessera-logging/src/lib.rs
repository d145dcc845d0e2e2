//! Logging bootstrap.
//!
//! Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to a
//! default directive when the variable is unset or unparsable.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber with [`DEFAULT_FILTER`].
///
/// Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    init_with_filter(DEFAULT_FILTER)
}

/// Install the global subscriber, using `fallback` when `RUST_LOG` is unset.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_with_filter(fallback: &str) -> bool {
    tracing_subscriber::registry()
        .with(filter(fallback))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

/// Install a test-friendly subscriber that writes through the test harness.
/// Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(filter("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}
