//! Trade model. Append-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub id: Uuid,
    pub buyer_order_id: Uuid,
    pub seller_order_id: Uuid,
    /// Sourced from the buyer's order's `symbol_id`. Both sides are
    /// enforced to match by manager routing — the manager only ever
    /// matches orders already loaded into the same symbol's engine.
    pub symbol_id: Uuid,
    pub quantity: i64,
    pub price: Decimal,
    pub executed_at: DateTime<Utc>,
}
