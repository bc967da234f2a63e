//! Periodic top-of-book reporting

use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::orderbook::{BookSummary, SharedBook};

/// Summary worth reporting, or `None` while the book has no snapshot
pub async fn top_of_book(book: &SharedBook) -> Option<BookSummary> {
    let book = book.read().await;
    book.is_initialized().then(|| book.summary())
}

/// Log best bid and best ask every `period` until cancelled
pub async fn report_top_of_book(book: SharedBook, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(summary) = top_of_book(&book).await else {
            continue;
        };

        info!(
            best_bid = ?summary.best_bid,
            best_ask = ?summary.best_ask,
            mid_price = ?summary.mid_price,
            spread_bps = ?summary.spread_bps,
            "Top of book"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{Order, OrderBook, Snapshot};
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    #[tokio::test]
    async fn test_top_of_book_skips_uninitialized() {
        let book: SharedBook = Arc::new(RwLock::new(OrderBook::new("BTCUSDT")));
        assert!(top_of_book(&book).await.is_none());

        book.write().await.replace(&Snapshot {
            last_update_id: 7,
            bids: vec![Order::new(dec!(10), dec!(1))],
            asks: vec![Order::new(dec!(11), dec!(1))],
        });

        let summary = top_of_book(&book).await.unwrap();
        assert_eq!(summary.best_bid, Some(dec!(10)));
        assert_eq!(summary.best_ask, Some(dec!(11)));
    }

    #[tokio::test]
    async fn test_reporter_stops_on_cancel() {
        let book: SharedBook = Arc::new(RwLock::new(OrderBook::new("BTCUSDT")));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(report_top_of_book(
            book,
            Duration::from_millis(5),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
