//! Order book summary figures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Computed figures for an order book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSummary {
    pub best_bid: Option<Decimal>,

    pub best_ask: Option<Decimal>,

    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Spread in basis points
    pub spread_bps: Option<Decimal>,

    /// Total bid depth (volume)
    pub bid_depth: Decimal,

    /// Total ask depth (volume)
    pub ask_depth: Decimal,

    /// Number of bid levels
    pub bid_levels: usize,

    /// Number of ask levels
    pub ask_levels: usize,
}

impl BookSummary {
    /// Both sides populated and not crossed
    pub fn is_healthy(&self) -> bool {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => bid < ask,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_healthy() {
        let mut summary = BookSummary {
            best_bid: Some(dec!(100)),
            best_ask: Some(dec!(101)),
            ..BookSummary::default()
        };
        assert!(summary.is_healthy());

        summary.best_ask = Some(dec!(100));
        assert!(!summary.is_healthy());

        assert!(!BookSummary::default().is_healthy());
    }
}
