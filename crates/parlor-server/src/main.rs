//! # Parlor Server
//!
//! A single chat room served over WebSocket.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! parlor
//!
//! # Run with a custom config file
//! PARLOR_CONFIG=/path/to/parlor.toml parlor
//!
//! # Run with environment overrides
//! PARLOR_PORT=8080 PARLOR_HOST=0.0.0.0 PARLOR_ROOM__TRACE=true parlor
//! ```
//!
//! Browsers connect to `ws://host:port/room` carrying an `auth` cookie with
//! their base64-encoded profile.

mod avatar;
mod config;
mod handlers;
mod identity;
mod metrics;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parlor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting Parlor server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
