//! Queries the order-book manager issues against the durable store.
//! Runtime-checked `sqlx::query`/`query_as` bound by position, not
//! compile-time `query!` macros (no reachable database at build time here).

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::order::{Order, OrderStatus};
use crate::models::position::Position;
use crate::models::symbol::Symbol;
use crate::models::trade::Trade;

/// Fetch a symbol by its unique code.
pub async fn find_symbol_by_code(pool: &PgPool, code: &str) -> CoreResult<Symbol> {
    sqlx::query_as::<_, Symbol>(
        r#"
        SELECT id, code, name, category, underlying_id, tick_size, lot_size,
               trading_halted, settlement_active, settlement_price
        FROM symbols
        WHERE code = $1
        "#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CoreError::UnknownSymbol(code.to_string()))
}

pub async fn find_symbol_by_id(pool: &PgPool, symbol_id: Uuid) -> CoreResult<Symbol> {
    sqlx::query_as::<_, Symbol>(
        r#"
        SELECT id, code, name, category, underlying_id, tick_size, lot_size,
               trading_halted, settlement_active, settlement_price
        FROM symbols
        WHERE id = $1
        "#,
    )
    .bind(symbol_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| CoreError::UnknownSymbol(symbol_id.to_string()))
}

/// All open (`pending` or `partial`) orders for a symbol, ordered by
/// arrival, for `ensure_loaded`.
pub async fn open_orders_for_symbol(pool: &PgPool, symbol_id: Uuid) -> CoreResult<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, team_id, symbol_id, side, order_type, quantity, price,
               filled_quantity, status, created_at, updated_at
        FROM orders
        WHERE symbol_id = $1 AND status IN ('pending', 'partial')
        ORDER BY created_at, id
        "#,
    )
    .bind(symbol_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

pub async fn find_order(pool: &PgPool, order_id: Uuid) -> CoreResult<Order> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, team_id, symbol_id, side, order_type, quantity, price,
               filled_quantity, status, created_at, updated_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CoreError::OrderNotFound(order_id))
}

pub async fn insert_pending_order(pool: &PgPool, order: &Order) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO orders
            (id, team_id, symbol_id, side, order_type, quantity, price,
             filled_quantity, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(order.id)
    .bind(order.team_id)
    .bind(order.symbol_id)
    .bind(order.side)
    .bind(order.order_type)
    .bind(order.quantity)
    .bind(order.price)
    .bind(order.filled_quantity)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(pool)
    .await
    .map_err(|e| CoreError::from_sqlx(order.id.to_string(), e))?;
    Ok(())
}

/// Apply a fill or STP cancellation to an order row's fill quantity and
/// status.
pub async fn apply_fill(pool: &PgPool, order_id: Uuid, filled_quantity: i64, status: OrderStatus) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE orders
        SET filled_quantity = $2, status = $3, updated_at = $4
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .bind(filled_quantity)
    .bind(status)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_cancelled(pool: &PgPool, order_id: Uuid) -> CoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = 'cancelled', updated_at = $2
        WHERE id = $1 AND status IN ('pending', 'partial')
        "#,
    )
    .bind(order_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(CoreError::OrderNotFound(order_id));
    }
    Ok(())
}

pub async fn insert_trade(pool: &PgPool, trade: &Trade) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO trades (id, buyer_order_id, seller_order_id, symbol_id, quantity, price, executed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(trade.id)
    .bind(trade.buyer_order_id)
    .bind(trade.seller_order_id)
    .bind(trade.symbol_id)
    .bind(trade.quantity)
    .bind(trade.price)
    .bind(trade.executed_at)
    .execute(pool)
    .await
    .map_err(|e| CoreError::from_sqlx(trade.symbol_id.to_string(), e))?;
    Ok(())
}

pub async fn find_position(pool: &PgPool, team_id: Uuid, symbol_id: Uuid) -> CoreResult<Position> {
    let existing = sqlx::query_as::<_, Position>(
        r#"
        SELECT team_id, symbol_id, quantity, average_price, realized_pnl
        FROM positions
        WHERE team_id = $1 AND symbol_id = $2
        "#,
    )
    .bind(team_id)
    .bind(symbol_id)
    .fetch_optional(pool)
    .await?;
    Ok(existing.unwrap_or_else(|| Position::flat(team_id, symbol_id)))
}

pub async fn upsert_position(pool: &PgPool, pos: &Position) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO positions (team_id, symbol_id, quantity, average_price, realized_pnl)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (team_id, symbol_id)
        DO UPDATE SET quantity = $3, average_price = $4, realized_pnl = $5
        "#,
    )
    .bind(pos.team_id)
    .bind(pos.symbol_id)
    .bind(pos.quantity)
    .bind(pos.average_price)
    .bind(pos.realized_pnl)
    .execute(pool)
    .await
    .map_err(|e| CoreError::from_sqlx(pos.symbol_id.to_string(), e))?;
    Ok(())
}

pub async fn all_positions_for_symbol(pool: &PgPool, symbol_id: Uuid) -> CoreResult<Vec<Position>> {
    let positions = sqlx::query_as::<_, Position>(
        r#"
        SELECT team_id, symbol_id, quantity, average_price, realized_pnl
        FROM positions
        WHERE symbol_id = $1 AND quantity != 0
        "#,
    )
    .bind(symbol_id)
    .fetch_all(pool)
    .await?;
    Ok(positions)
}

pub async fn settle_symbol(pool: &PgPool, symbol_id: Uuid, settlement_price: Decimal) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE symbols
        SET settlement_active = true, trading_halted = true, settlement_price = $2
        WHERE id = $1
        "#,
    )
    .bind(symbol_id)
    .bind(settlement_price)
    .execute(pool)
    .await?;
    Ok(())
}

/// Operator-driven `pause`/`start`: flip `trading_halted` for one symbol
/// (or, when `symbol_id` is `None`, every symbol) without touching
/// `settlement_active`. Settlement halts independently via `settle_symbol`
/// and is never lifted by `start`.
pub async fn set_trading_halted(pool: &PgPool, symbol_id: Option<Uuid>, halted: bool) -> CoreResult<()> {
    match symbol_id {
        Some(id) => {
            sqlx::query("UPDATE symbols SET trading_halted = $2 WHERE id = $1")
                .bind(id)
                .bind(halted)
                .execute(pool)
                .await?;
        }
        None => {
            sqlx::query("UPDATE symbols SET trading_halted = $1")
                .bind(halted)
                .execute(pool)
                .await?;
        }
    }
    Ok(())
}
