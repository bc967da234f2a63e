//! Exchange facade
//!
//! The single surface consumers depend on: a handle to the live book and the
//! loop that keeps it current. Wire formats stay behind this trait.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::metrics::SyncMetrics;
use crate::orderbook::{OrderBook, SharedBook};
use crate::rest::BinanceSnapshotClient;
use crate::sync::{drive, RetryPolicy, Synchronizer};
use crate::websocket::BinanceStream;

#[async_trait]
pub trait Exchange: Send + Sync {
    fn symbol(&self) -> &str;

    /// Live book handle; take a read guard to query it
    fn current_book(&self) -> SharedBook;

    /// Keep the book synchronized until cancelled or a fatal error
    async fn run(&self, cancel: CancellationToken) -> Result<()>;
}

/// Binance spot depth replica for one symbol
pub struct BinanceExchange {
    config: Arc<Config>,
    book: SharedBook,
    snapshots: BinanceSnapshotClient,
    metrics: Arc<SyncMetrics>,
}

impl BinanceExchange {
    pub fn new(config: Arc<Config>, metrics: Arc<SyncMetrics>) -> Result<Self> {
        config.validate()?;
        let snapshots = BinanceSnapshotClient::new(&config)?;
        let book = Arc::new(RwLock::new(OrderBook::new(&config.symbol)));

        Ok(Self {
            config,
            book,
            snapshots,
            metrics,
        })
    }
}

#[async_trait]
impl Exchange for BinanceExchange {
    fn symbol(&self) -> &str {
        &self.config.symbol
    }

    fn current_book(&self) -> SharedBook {
        self.book.clone()
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let mut stream = BinanceStream::new(&self.config);
        let mut synchronizer = Synchronizer::new(
            &self.config.symbol,
            self.config.snapshot_limit,
            self.snapshots.clone(),
            self.book.clone(),
            RetryPolicy::from_config(&self.config),
            self.metrics.clone(),
        )
        .with_cancellation(cancel.clone());

        let result = drive(&mut stream, &mut synchronizer, &cancel).await;
        stream.close().await;

        info!(symbol = %self.config.symbol, ok = result.is_ok(), "Exchange run loop finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_current_book_starts_uninitialized() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let exchange = BinanceExchange::new(Arc::new(Config::default()), metrics).unwrap();

        assert_eq!(exchange.symbol(), "BTCUSDT");
        let book = exchange.current_book();
        assert!(!book.read().await.is_initialized());
        assert!(Arc::ptr_eq(&book, &exchange.current_book()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let config = Config {
            symbol: String::new(),
            ..Config::default()
        };
        assert!(BinanceExchange::new(Arc::new(config), metrics).is_err());
    }

    #[tokio::test]
    async fn test_run_returns_when_cancelled() {
        let metrics = Arc::new(SyncMetrics::new().unwrap());
        let exchange = BinanceExchange::new(Arc::new(Config::default()), metrics).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(exchange.run(cancel).await.is_ok());
        assert!(!exchange.current_book().read().await.is_initialized());
    }
}
