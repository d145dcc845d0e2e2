//! Replay a recorded fixture through a headless session and print the
//! final state as JSON.
//!
//! Usage: `tessera-replay <fixture.json> [compact|focus]`

use std::path::PathBuf;

use tessera_session::replay::{replay, Fixture};
use tessera_view::PresentationMode;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tessera_logging::init();

    let mut args = std::env::args().skip(1);
    let path: PathBuf = args
        .next()
        .ok_or("usage: tessera-replay <fixture.json> [compact|focus]")?
        .into();
    let mode: PresentationMode = match args.next() {
        Some(raw) => raw.parse()?,
        None => PresentationMode::default(),
    };

    info!(path = %path.display(), ?mode, "replaying fixture");
    let fixture = Fixture::load(&path)?;
    let report = replay(&fixture, mode).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
