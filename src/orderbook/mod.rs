//! Order book module
//!
//! Price level store for the local replica plus the domain events that mutate it.

mod book;
mod summary;

pub use book::OrderBook;
pub use summary::BookSummary;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Store handle shared between the synchronizer and readers.
///
/// Writers hold the guard for a whole diff or snapshot, so readers only ever
/// see complete book states.
pub type SharedBook = Arc<RwLock<OrderBook>>;

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// Resting quantity at a price. A zero quantity in an update removes the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl Order {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

/// Incremental update covering sequence ids `first_update_id..=last_update_id`
#[derive(Debug, Clone, PartialEq)]
pub struct DiffEvent {
    pub first_update_id: u64,
    pub last_update_id: u64,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

/// Full book state as of `last_update_id`
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub last_update_id: u64,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

/// Order book state for external consumers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookState {
    pub symbol: String,
    pub last_update_id: u64,
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
    pub summary: BookSummary,
}
