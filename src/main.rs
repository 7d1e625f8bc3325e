//! # Avalanche Chat Server
//!
//! Chat-driven DeFi assistant backend built with Rust, Axum, and Tokio.
//!
//! ## Features
//! - Async/await HTTP server using Axum framework
//! - Structured logging with tracing
//! - Health check endpoints for monitoring
//! - Intent classification and markdown formatting via chat completions
//! - Rate-limited, cached market data gateway
//! - Natural-language transaction building through the execution API
//! - Session-authenticated websocket chat with heartbeats
//!
//! ## Architecture
//! The server is organized into modules:
//! - `server`: Service wiring, router assembly, and startup
//! - `config`: Environment variable configuration management
//! - `agent`: Intent classification, dispatch, and response formatting
//! - `market`: Market data gateway and live price feed manager
//! - `execution`: Transaction execution API client
//! - `ws`: Websocket protocol, connection registry, and handler
//! - `routes`: HTTP route handlers organized by functionality
//!
//! ## Environment Setup
//! Copy `.env.example` to `.env` and configure:
//! ```bash
//! cp .env.example .env
//! # Edit .env with your API keys
//! ```
//!
//! ## Running the Server
//! ```bash
//! cargo run
//! ```
//!
//! The server will start on `http://0.0.0.0:5000` by default.
//!
//! ## Health Check
//! Once running, you can verify the server is operational:
//! ```bash
//! curl http://localhost:5000/ping
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use avachat_server::config::Config;
use avachat_server::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize the tracing subscriber for structured logging
    // This sets up console output with timestamps and proper formatting
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false) // Don't show module targets for cleaner output
                .compact(), // Use compact formatting
        )
        .init();

    // Log application startup
    tracing::info!("🏁 Starting chat server...");
    tracing::info!(
        "📦 Package: {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        "🏗️  Build profile: {}",
        if cfg!(debug_assertions) { "debug" } else { "release" }
    );

    let config = Config::from_env()?;
    server::start(config).await
}
