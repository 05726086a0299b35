//! In-memory matching DTOs passed between the engine, the order-book
//! manager, and position accounting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::matching::price::Ticks;
use crate::models::order::{OrderType, Side};

/// An order resting in (or being matched into) a single symbol's book.
/// `sequence` is the monotonic admission counter used as the
/// price-time-priority tiebreak within a price level (FIFO within a
/// price level).
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub id: Uuid,
    pub team_id: Uuid,
    pub side: Side,
    pub price: Ticks,
    pub remaining: i64,
    pub sequence: u64,
}

/// A fresh order submitted to the engine, not yet matched.
#[derive(Debug, Clone)]
pub struct IncomingOrder {
    pub id: Uuid,
    pub team_id: Uuid,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Ticks,
    pub remaining: i64,
}

/// One fill produced by a match — always one resting order against one
/// incoming order. `price` is the resting order's price — trades always
/// execute at the resting order's price, never the incoming order's.
#[derive(Debug, Clone)]
pub struct Fill {
    pub resting_order_id: Uuid,
    pub resting_team_id: Uuid,
    pub incoming_order_id: Uuid,
    pub incoming_team_id: Uuid,
    pub buyer_order_id: Uuid,
    pub seller_order_id: Uuid,
    pub price: Ticks,
    pub quantity: i64,
    pub executed_at: DateTime<Utc>,
}

/// A resting order cancelled as a side-effect of self-trade prevention.
/// Cancel-resting is the only STP mode implemented: the incoming order's
/// own remaining quantity is reduced directly rather than cancelled.
#[derive(Debug, Clone)]
pub struct StpCancellation {
    pub resting_order_id: Uuid,
    pub team_id: Uuid,
    pub cancelled_quantity: i64,
}

/// Everything that happened while matching one incoming order, in the
/// order the caller should persist and notify: fills, STP cancellations,
/// and the incoming order's final disposition.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub fills: Vec<Fill>,
    pub stp_cancellations: Vec<StpCancellation>,
    pub incoming_filled: i64,
    pub incoming_remaining: i64,
    pub resting: bool,
}

/// A price level snapshot: the aggregate resting quantity at one price.
#[derive(Debug, Clone, Copy)]
pub struct DepthLevel {
    pub price: Decimal,
    pub quantity: i64,
}

/// Top-of-book-to-depth snapshot handed to the notifier and to read APIs.
#[derive(Debug, Clone)]
pub struct BookDepth {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}
