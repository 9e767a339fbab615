//! # Community Core
//!
//! Process entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - Counter store, event log and durable repository backends
//! - The sync worker and the operational HTTP server

use anyhow::Result;
use tracing::info;

use community_core::config::Settings;
use community_core::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    community_core::telemetry::init_tracing();

    info!("Starting Community Core...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        backend = ?settings.storage.backend,
        topic = %settings.sync.topic,
        "Configuration loaded"
    );

    // Build and run the application
    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Shutdown complete");
    Ok(())
}
