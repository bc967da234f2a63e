//! Core order book implementation
//!
//! Uses BTreeMap for efficient sorted price level management.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{BookSummary, DiffEvent, Order, OrderBookState, Side, Snapshot};

/// Order book replica for a single symbol
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
    /// Sequence id of the last installed snapshot or applied diff, 0 when empty
    last_update_id: u64,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id: 0,
        }
    }

    /// Discard every level and install the snapshot
    pub fn replace(&mut self, snapshot: &Snapshot) {
        self.bids.clear();
        self.asks.clear();

        for order in &snapshot.bids {
            self.upsert(Side::Bid, order.price, order.quantity);
        }

        for order in &snapshot.asks {
            self.upsert(Side::Ask, order.price, order.quantity);
        }

        self.last_update_id = snapshot.last_update_id;
    }

    /// Apply every level of a diff and advance the sequence id.
    ///
    /// Sequencing is the caller's concern; this only mutates levels.
    pub fn apply_diff(&mut self, event: &DiffEvent) {
        for order in &event.bids {
            self.upsert(Side::Bid, order.price, order.quantity);
        }

        for order in &event.asks {
            self.upsert(Side::Ask, order.price, order.quantity);
        }

        self.last_update_id = event.last_update_id;
    }

    /// Insert or replace a level; a non-positive quantity removes it.
    ///
    /// Removing a price that is not resting is a no-op.
    pub fn upsert(&mut self, side: Side, price: Decimal, quantity: Decimal) {
        let resting = quantity > Decimal::ZERO;
        match side {
            Side::Bid => {
                if resting {
                    self.bids.insert(Reverse(price), quantity);
                } else {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Ask => {
                if resting {
                    self.asks.insert(price, quantity);
                } else {
                    self.asks.remove(&price);
                }
            }
        }
    }

    /// Drop all levels and return to the uninitialized state
    pub fn reset(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_id = 0;
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first_key_value().map(|(Reverse(p), _)| *p)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first_key_value().map(|(p, _)| *p)
    }

    pub fn best_bid_level(&self) -> Option<Order> {
        self.bids
            .first_key_value()
            .map(|(Reverse(p), q)| Order::new(*p, *q))
    }

    pub fn best_ask_level(&self) -> Option<Order> {
        self.asks.first_key_value().map(|(p, q)| Order::new(*p, *q))
    }

    /// Top `n` bids, highest first
    pub fn top_bids(&self, n: usize) -> Vec<Order> {
        self.bids
            .iter()
            .take(n)
            .map(|(Reverse(p), q)| Order::new(*p, *q))
            .collect()
    }

    /// Top `n` asks, lowest first
    pub fn top_asks(&self, n: usize) -> Vec<Order> {
        self.asks
            .iter()
            .take(n)
            .map(|(p, q)| Order::new(*p, *q))
            .collect()
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::from(2)),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get spread in basis points
    pub fn spread_bps(&self) -> Option<Decimal> {
        match (self.spread(), self.mid_price()) {
            (Some(spread), Some(mid)) if mid > Decimal::ZERO => {
                Some(spread / mid * Decimal::from(10000))
            }
            _ => None,
        }
    }

    /// True when the best bid is at or above the best ask.
    ///
    /// Valid exchange data never produces this; the store does not prevent it.
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(bid), Some(ask)) if bid >= ask)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// A book with sequence id 0 has never received a snapshot
    pub fn is_initialized(&self) -> bool {
        self.last_update_id != 0
    }

    /// Get last update ID
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Aggregate figures over the whole book
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            mid_price: self.mid_price(),
            spread_bps: self.spread_bps(),
            bid_depth: self.bids.values().copied().sum(),
            ask_depth: self.asks.values().copied().sum(),
            bid_levels: self.bids.len(),
            ask_levels: self.asks.len(),
        }
    }

    /// Get current state limited to `depth` levels per side
    pub fn state(&self, depth: usize) -> OrderBookState {
        OrderBookState {
            symbol: self.symbol.clone(),
            last_update_id: self.last_update_id,
            bids: self.top_bids(depth),
            asks: self.top_asks(depth),
            summary: self.summary(),
        }
    }
}
