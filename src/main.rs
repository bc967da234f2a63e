//! Depth Sync - order book replica service
//!
//! Maintains a local Binance order book, reports the top of book on an
//! interval and serves health/metrics endpoints.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use depth_sync::reporter::report_top_of_book;
use depth_sync::server::{self, AppState};
use depth_sync::{BinanceExchange, Config, Exchange, SyncMetrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Depth Sync");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(symbol = %config.symbol, limit = config.snapshot_limit, "Configuration loaded");

    let metrics = Arc::new(SyncMetrics::new()?);
    let exchange = BinanceExchange::new(config.clone(), metrics.clone())?;
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    // Start health check server
    let state = Arc::new(AppState {
        book: exchange.current_book(),
        metrics,
    });
    let health_port = config.health_port;
    let health_cancel = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = server::serve(health_port, state, health_cancel).await {
            warn!(error = %e, "Health server error");
        }
    });

    let reporter = tokio::spawn(report_top_of_book(
        exchange.current_book(),
        config.report_interval(),
        cancel.clone(),
    ));

    let result = exchange.run(cancel.clone()).await;
    cancel.cancel();
    let _ = reporter.await;

    if let Err(e) = &result {
        error!(error = %e, "Depth synchronization stopped");
    }
    result?;

    info!("Depth Sync stopped");
    Ok(())
}
