// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Routes:
//! - `GET /ws` upgrades to the dashboard WebSocket protocol
//! - `GET /health` reports liveness and distribution counters

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use wagate_bus::SessionEventQueue;
use wagate_core::GatewayError;

use crate::hub::EventHub;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<EventHub>,
    /// Events held back while no dashboard is authenticated.
    pub queue: Arc<SessionEventQueue>,
    /// Process start time for uptime calculation.
    pub started: Instant,
}

impl AppState {
    pub fn new(hub: Arc<EventHub>, queue: Arc<SessionEventQueue>) -> Self {
        Self {
            hub,
            queue,
            started: Instant::now(),
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub clients: usize,
    pub authenticated_clients: usize,
    pub queued_events: usize,
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        clients: state.hub.client_count(),
        authenticated_clients: state.hub.authenticated_count(),
        queued_events: state.queue.total(),
    })
}

/// All gateway routes with CORS and request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind the listener, mapping failures to a hub error.
pub async fn bind(host: &str, port: u16) -> Result<TcpListener, GatewayError> {
    let addr = format!("{host}:{port}");
    TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Hub {
            message: format!("failed to bind gateway to {addr}: {e}"),
        })
}

/// Serve until `shutdown` fires. The hub is shut down first so open
/// WebSocket connections close and graceful shutdown can finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), GatewayError> {
    let addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    tracing::info!("gateway listening on {addr}");

    let hub = state.hub.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            hub.shutdown();
        })
        .await
        .map_err(|e| GatewayError::Hub {
            message: format!("gateway server error: {e}"),
        })
}
