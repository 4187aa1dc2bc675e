//! Docbridge - HTTP REST gateway for MongoDB document operations
//!
//! This binary serves the REST API with request logging, metrics, and
//! graceful shutdown.

use docbridge::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up MONGODB settings from a local .env in development
    dotenvy::dotenv().ok();

    // Load configuration
    let config = ServerConfig::load()?;

    // Start server
    docbridge::start_server(config).await?;

    Ok(())
}
