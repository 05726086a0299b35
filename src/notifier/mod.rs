//! Market-data notifier: the interface the order-book manager calls to
//! publish book and trade events.
//!
//! Events go to a bounded channel and a dedicated fan-out task drains it,
//! so a slow subscriber cannot back up the matcher. `notify_book`/
//! `notify_trade` never block and never fail the caller.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TradeUpdate {
    pub symbol: String,
    pub price: Decimal,
    pub quantity: i64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum MarketDataEvent {
    Book(BookUpdate),
    Trade(TradeUpdate),
}

/// Single-threaded fan-out interface consumed by the manager. Accepts
/// calls synchronously from the manager's viewpoint; internally this is a
/// non-blocking `try_send` onto a bounded broadcast channel, so a
/// subscriber that cannot keep up is lagged (and told so on its next
/// `recv`) rather than allowed to block the matcher.
pub trait MarketDataNotifier: Send + Sync {
    fn notify_book(&self, update: BookUpdate);
    fn notify_trade(&self, update: TradeUpdate);
}

/// Default notifier: a `tokio::sync::broadcast` channel. Subscribers call
/// `subscribe()` and drain it from their own task; lag is surfaced to
/// them as `RecvError::Lagged`, never back-pressured onto the sender.
pub struct BroadcastNotifier {
    sender: broadcast::Sender<MarketDataEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MarketDataEvent> {
        self.sender.subscribe()
    }
}

impl MarketDataNotifier for BroadcastNotifier {
    fn notify_book(&self, update: BookUpdate) {
        // `send` only fails when there are no receivers; that is not an
        // error condition for the matcher.
        let _ = self.sender.send(MarketDataEvent::Book(update));
    }

    fn notify_trade(&self, update: TradeUpdate) {
        let _ = self.sender.send(MarketDataEvent::Trade(update));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_book_and_trade_events() {
        let notifier = BroadcastNotifier::new(16);
        let mut rx = notifier.subscribe();

        notifier.notify_book(BookUpdate {
            symbol: "AAPL".to_string(),
            bids: vec![],
            asks: vec![],
            ts: Utc::now(),
        });

        match rx.recv().await.unwrap() {
            MarketDataEvent::Book(update) => assert_eq!(update.symbol, "AAPL"),
            MarketDataEvent::Trade(_) => panic!("expected a book update"),
        }
    }

    #[test]
    fn notify_with_no_subscribers_does_not_panic() {
        let notifier = BroadcastNotifier::new(16);
        notifier.notify_trade(TradeUpdate {
            symbol: "AAPL".to_string(),
            price: Decimal::ZERO,
            quantity: 1,
            ts: Utc::now(),
        });
    }
}
