//! HTTP request handler.
//!
//! A thin axum front over the settlement coordinator: a health probe, the
//! `POST /swap` settlement entry point and a read-only view of settlements
//! awaiting reconciliation. CORS is open for browser front-ends.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

pub use routes::{ApiState, AppState};

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/swap", post(routes::execute_swap))
        .route("/api/settlements/pending", get(routes::get_pending))
        .layer(cors)
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
