//! HTTP server for health checks, metrics and the current book

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::metrics::SyncMetrics;
use crate::orderbook::{OrderBookState, SharedBook};

/// Levels per side returned by `/book`
const BOOK_DEPTH: usize = 20;

/// State shared with the HTTP handlers
pub struct AppState {
    pub book: SharedBook,
    pub metrics: Arc<SyncMetrics>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/book", get(book))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `cancel` fires
pub async fn serve(port: u16, state: Arc<AppState>, cancel: CancellationToken) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let book = state.book.read().await;
    Json(serde_json::json!({
        "status": "healthy",
        "component": "depth-sync",
        "symbol": book.symbol(),
        "initialized": book.is_initialized(),
        "last_update_id": book.last_update_id(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    state.metrics.encode().map_err(|e| {
        warn!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn book(State(state): State<Arc<AppState>>) -> Json<OrderBookState> {
    Json(state.book.read().await.state(BOOK_DEPTH))
}
