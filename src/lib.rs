//! Depth Sync - local order book replica
//!
//! Keeps a Binance order book in sync by anchoring on a REST depth snapshot
//! and applying the `@depth` diff stream, resyncing whenever the sequence
//! chain breaks. Readers query the live book through the [`Exchange`] facade.

pub mod backoff;
pub mod config;
pub mod error;
pub mod exchange;
pub mod metrics;
pub mod orderbook;
pub mod parser;
pub mod reporter;
pub mod rest;
pub mod server;
pub mod sync;
pub mod websocket;

pub use config::Config;
pub use error::{ReplicaError, Result};
pub use exchange::{BinanceExchange, Exchange};
pub use metrics::SyncMetrics;
pub use orderbook::{
    BookSummary, DiffEvent, Order, OrderBook, OrderBookState, SharedBook, Side, Snapshot,
};
pub use parser::{DepthSnapshot, DepthUpdate, ParsedMessage};
pub use rest::BinanceSnapshotClient;
pub use sync::{
    drive, RetryPolicy, SnapshotSource, StreamEvent, StreamSource, SyncOutcome, SyncState,
    Synchronizer,
};
pub use websocket::{BinanceStream, WebSocketClient};
