//! slchatd - Straylight Chat Daemon
//!
//! A room-based realtime chat coordinator: presence, membership, typing
//! indicators, and in-memory message state behind TCP/TLS/WebSocket links.

mod auth;
mod config;
mod error;
mod handlers;
mod http;
mod metrics;
mod network;
mod state;

use crate::config::Config;
use crate::network::Gateway;
use crate::state::Hub;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        node_id = %config.server.node_id,
        rooms = config.chat.rooms.len(),
        "Starting slchatd"
    );

    // SECURITY: Refuse to start with a default/weak assertion secret.
    // A guessable secret lets anyone mint identity assertions.
    if auth::is_default_secret(&config.auth.secret) {
        if std::env::var("SLCHATD_ALLOW_INSECURE_AUTH").is_ok() {
            tracing::warn!(
                "⚠️  INSECURE: Running with weak auth.secret (allowed via SLCHATD_ALLOW_INSECURE_AUTH)"
            );
        } else {
            error!("FATAL: Insecure auth.secret detected!");
            error!("  The auth.secret verifies identity assertions from the auth service.");
            error!("  A weak or default secret lets anyone forge an identity.");
            error!("");
            error!("  To fix, set a strong secret in config.toml:");
            error!("    [auth]");
            error!("    secret = \"<random-32-char-string>\"");
            error!("");
            error!("  Generate a secure secret with:");
            error!("    openssl rand -hex 32");
            error!("");
            error!("  For testing only, set SLCHATD_ALLOW_INSECURE_AUTH=1 to bypass this check.");
            return Err(anyhow::anyhow!(
                "Refusing to start with insecure auth.secret. See error messages above."
            ));
        }
    }

    // Create the Hub (shared state)
    let hub = Arc::new(Hub::new(&config));
    info!(
        server = %hub.server_info.name,
        default_room = %hub.server_info.default_room,
        "Hub created"
    );

    // The HTTP surface (metrics + query API) is optional.
    // Convention: http_port = 0 disables the endpoint (used by tests).
    let http_port = config.server.http_port.unwrap_or(9400);
    if http_port == 0 {
        info!("HTTP surface disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        let http_hub = Arc::clone(&hub);
        tokio::spawn(async move {
            http::run_http_server(http_port, http_hub).await;
        });
        info!(port = http_port, "HTTP server started");
    }

    // Start the Gateway (with optional TLS and WebSocket)
    let gateway = Gateway::bind(
        config.listen.address,
        config.tls.clone(),
        config.websocket.clone(),
        Arc::clone(&hub),
    )
    .await?;

    gateway.run().await?;

    Ok(())
}
