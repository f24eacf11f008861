//! Tank Monitoring Pipeline - Main Entry Point

use api::{init_logging, run_server, Settings};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== MoltWatch Tank Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    info!("Monitoring {} tank(s)", settings.tanks.len());

    run_server(settings).await?;

    Ok(())
}
