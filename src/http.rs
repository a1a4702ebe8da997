//! HTTP surface: Prometheus metrics and the read-only query API.
//!
//! Runs on a separate tokio task. `/metrics` serves Prometheus text format;
//! `/api/rooms`, `/api/users`, and `/api/messages` expose coordinator state
//! snapshots for dashboards and debugging. All routes are read-only.

use crate::state::SharedHub;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use slchat_proto::{ChatMessage, UserInfo};
use std::net::SocketAddr;

async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

async fn rooms_handler(State(hub): State<SharedHub>) -> Json<Vec<String>> {
    Json(hub.rooms.names())
}

async fn users_handler(State(hub): State<SharedHub>) -> Json<Vec<UserInfo>> {
    Json(hub.registry.roster())
}

async fn messages_handler(State(hub): State<SharedHub>) -> Json<Vec<ChatMessage>> {
    Json(hub.store.all_messages())
}

/// Run the HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_http_server(port: u16, hub: SharedHub) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/rooms", get(rooms_handler))
        .route("/api/users", get(users_handler))
        .route("/api/messages", get(messages_handler))
        .with_state(hub);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind HTTP server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("HTTP server error: {}", e);
    }
}
