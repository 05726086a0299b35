//! Order model: side, type, status, and the entry-request validation that
//! runs before a row is ever persisted. No `Rejected` status exists here —
//! rejection happens before persistence, as a returned validation error
//! with no durable side-effect.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_side", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// `filled <-> status` correspondence; `cancelled` and `filled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Partial,
    Filled,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Derive the status implied by `filled`/`quantity`, for a
    /// non-market-order finalizing as resting (never cancelled purely by
    /// running out of match opportunities).
    pub fn from_fill(filled: i64, quantity: i64) -> OrderStatus {
        if filled >= quantity {
            OrderStatus::Filled
        } else if filled > 0 {
            OrderStatus::Partial
        } else {
            OrderStatus::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub team_id: Uuid,
    pub symbol_id: Uuid,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Option<Decimal>,
    pub filled_quantity: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn remaining(&self) -> i64 {
        self.quantity - self.filled_quantity
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntryRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: i64,
    pub price: Option<Decimal>,
}

impl OrderEntryRequest {
    /// Rejects a missing price on a limit order, a non-positive
    /// quantity/price, or a priced market order.
    pub fn validate(&self) -> Result<(), crate::error::CoreError> {
        if self.quantity <= 0 {
            return Err(crate::error::CoreError::InvalidOrder(
                "quantity must be positive".to_string(),
            ));
        }
        match (self.order_type, self.price) {
            (OrderType::Limit, None) => Err(crate::error::CoreError::InvalidOrder(
                "limit order requires a price".to_string(),
            )),
            (OrderType::Limit, Some(p)) if p <= Decimal::ZERO => Err(
                crate::error::CoreError::InvalidOrder("price must be positive".to_string()),
            ),
            (OrderType::Market, Some(_)) => Err(crate::error::CoreError::InvalidOrder(
                "market order must not carry a price".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn limit_without_price_is_invalid() {
        let req = OrderEntryRequest {
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity: 10,
            price: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn market_with_price_is_invalid() {
        let req = OrderEntryRequest {
            symbol: "AAPL".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: 10,
            price: Some(dec!(1)),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn status_from_fill() {
        assert_eq!(OrderStatus::from_fill(0, 10), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_fill(5, 10), OrderStatus::Partial);
        assert_eq!(OrderStatus::from_fill(10, 10), OrderStatus::Filled);
    }
}
