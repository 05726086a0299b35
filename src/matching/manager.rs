//! Order-book manager: the live bridge between the matching engine and
//! the durable store.
//!
//! `place_and_match` runs its database writes inline rather than
//! fire-and-forget, so order entry is a single atomic step from the
//! caller's perspective. Symbol state is sharded in a `DashMap`, with a
//! `parking_lot::Mutex` guarding each symbol's engine and row cache — one
//! entry per symbol, so different symbols' books can run in parallel
//! while operations within one symbol never interleave.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::store;
use crate::error::{CoreError, CoreResult};
use crate::matching::accounting::{apply_trade_to_position, settle_position};
use crate::metrics;
use crate::matching::engine::{market_sentinel, MatchingEngine};
use crate::matching::price::Ticks;
use crate::matching::types::{BookDepth, IncomingOrder, RestingOrder};
use crate::models::order::{Order, OrderEntryRequest, OrderStatus, OrderType, Side};
use crate::models::symbol::Symbol;
use crate::models::trade::Trade;
use crate::notifier::{BookLevel, BookUpdate, MarketDataNotifier, TradeUpdate};

struct SymbolBook {
    engine: MatchingEngine,
    loaded: bool,
    /// Cache of the persisted row for each order currently known to the
    /// engine, so fill application doesn't need
    /// a round-trip to the store for orders it just touched.
    model_by_id: std::collections::HashMap<Uuid, Order>,
}

impl SymbolBook {
    fn new() -> Self {
        Self {
            engine: MatchingEngine::new(),
            loaded: false,
            model_by_id: std::collections::HashMap::new(),
        }
    }
}

pub struct OrderBookManager {
    pool: PgPool,
    notifier: Arc<dyn MarketDataNotifier>,
    depth_n: usize,
    books: DashMap<Uuid, Mutex<SymbolBook>>,
}

impl OrderBookManager {
    pub fn new(pool: PgPool, notifier: Arc<dyn MarketDataNotifier>, depth_n: usize) -> Self {
        Self {
            pool,
            notifier,
            depth_n,
            books: DashMap::new(),
        }
    }

    /// Rebuild a symbol's engine from every `pending`/`partial` order row,
    /// skipping market orders and orders with no price (they never rest).
    async fn ensure_loaded(&self, symbol_id: Uuid, exclude_ids: &[Uuid]) -> CoreResult<()> {
        // The entry guard is scoped tightly and dropped before the store
        // round-trip below: holding dashmap's write guard across an
        // `.await` would stall every other key in the same shard for the
        // duration of the query.
        let already_loaded = {
            let entry = self.books.entry(symbol_id).or_insert_with(|| Mutex::new(SymbolBook::new()));
            entry.lock().loaded
        };

        if !already_loaded {
            let rows = store::open_orders_for_symbol(&self.pool, symbol_id).await?;
            let entry = self.books.get(&symbol_id).expect("entry inserted above");
            let mut book = entry.value().lock();
            if book.loaded {
                // a concurrent `ensure_loaded` for the same symbol finished
                // while this call was awaiting the store.
                return Ok(());
            }
            for row in rows {
                if row.order_type == OrderType::Market || row.price.is_none() {
                    continue;
                }
                if exclude_ids.contains(&row.id) {
                    continue;
                }
                let remaining = row.remaining();
                if remaining <= 0 {
                    continue;
                }
                let price = Ticks::from_decimal(row.price.unwrap());
                book.engine.add_resting(RestingOrder {
                    id: row.id,
                    team_id: row.team_id,
                    side: row.side,
                    price,
                    remaining,
                    sequence: 0,
                });
                book.model_by_id.insert(row.id, row);
            }
            book.loaded = true;
        } else if !exclude_ids.is_empty() {
            if let Some(entry) = self.books.get(&symbol_id) {
                let mut book = entry.value().lock();
                for id in exclude_ids {
                    book.engine.remove_order(*id);
                    book.model_by_id.remove(id);
                }
            }
        }
        Ok(())
    }

    /// `team_id` is the authenticated caller's team (already authorized
    /// by the out-of-scope façade).
    pub async fn place_and_match(&self, symbol_code: &str, team_id: Uuid, request: OrderEntryRequest) -> CoreResult<Vec<Trade>> {
        request.validate()?;

        let symbol = store::find_symbol_by_code(&self.pool, symbol_code).await?;
        if !symbol.is_tradable() {
            return Err(CoreError::SymbolNotTradable(symbol_code.to_string()));
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            team_id,
            symbol_id: symbol.id,
            side: request.side,
            order_type: request.order_type,
            quantity: request.quantity,
            price: request.price,
            filled_quantity: 0,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        store::insert_pending_order(&self.pool, &order).await?;
        debug!(order_id = %order.id, symbol = %symbol.code, side = %order.side, "order persisted, entering match");
        metrics::record_order_submitted(
            &symbol.code,
            &order.side.to_string(),
            match order.order_type {
                OrderType::Market => "market",
                OrderType::Limit => "limit",
            },
        );
        let match_timer = metrics::Timer::new();

        if let Err(e) = self.ensure_loaded(symbol.id, &[order.id]).await {
            self.reset_book(symbol.id);
            return Err(e);
        }

        let price_ticks = match order.price {
            Some(p) => Ticks::from_decimal(p),
            None => market_sentinel(order.side),
        };
        let incoming = IncomingOrder {
            id: order.id,
            team_id,
            side: order.side,
            order_type: order.order_type,
            price: price_ticks,
            remaining: order.quantity,
        };

        // The `Ref` guard is dropped before any `.await` below: holding it
        // across an await while `resolve_order`/`apply_fill_to_order` take
        // their own `Ref` on the same key would risk a shard-lock deadlock
        // (dashmap's own caveat on nested same-key access from one task).
        let outcome = {
            let entry = self.books.get(&symbol.id).expect("ensure_loaded populated this symbol");
            let mut book = entry.value().lock();
            book.engine.add_order(incoming)
        };

        // From here on, every step is a durable write derived from an
        // in-memory match that already happened. A failure partway
        // through would leave the engine's book out of sync with the
        // store, so any error discards this symbol's loaded engine — the
        // next call rebuilds fresh from the store, which is the source
        // of truth (spec §4.C "Consistency notes", §7 "DurableConflict").
        let (trade_rows, final_status) = match self.persist_match_outcome(&symbol, &order, &outcome).await {
            Ok(result) => result,
            Err(e) => {
                warn!(order_id = %order.id, symbol = %symbol.code, error = %e, "durable write failed mid-match, discarding book");
                self.reset_book(symbol.id);
                return Err(e);
            }
        };

        self.reconcile_terminal(symbol.id).await;
        self.emit_book_update(&symbol, symbol.id).await;
        metrics::record_order_match_duration(match_timer.elapsed_secs());
        for trade in &trade_rows {
            self.notifier.notify_trade(TradeUpdate {
                symbol: symbol.code.clone(),
                price: trade.price,
                quantity: trade.quantity,
                ts: trade.executed_at,
            });
        }

        info!(
            order_id = %order.id,
            symbol = %symbol.code,
            trades = trade_rows.len(),
            cancels = outcome.stp_cancellations.len(),
            status = ?final_status,
            "order processed"
        );

        Ok(trade_rows)
    }

    /// Persist every durable consequence of one `add_order` call: trade
    /// rows, fill application to both sides, position updates, STP
    /// cancellation bookkeeping, and the incoming order's final status.
    /// Split out of `place_and_match` so the caller has one place to
    /// react to a mid-flight durable failure.
    async fn persist_match_outcome(
        &self,
        symbol: &Symbol,
        order: &Order,
        outcome: &crate::matching::types::MatchOutcome,
    ) -> CoreResult<(Vec<Trade>, OrderStatus)> {
        let mut trade_rows = Vec::with_capacity(outcome.fills.len());
        for fill in &outcome.fills {
            let buyer_row = self.resolve_order(symbol.id, fill.buyer_order_id, order).await?;
            let seller_row = self.resolve_order(symbol.id, fill.seller_order_id, order).await?;

            let trade = Trade {
                id: Uuid::new_v4(),
                buyer_order_id: fill.buyer_order_id,
                seller_order_id: fill.seller_order_id,
                symbol_id: buyer_row.symbol_id,
                quantity: fill.quantity,
                price: fill.price.to_decimal(),
                executed_at: fill.executed_at,
            };
            store::insert_trade(&self.pool, &trade).await?;
            metrics::record_trade_executed(&symbol.code, trade.quantity);

            self.apply_fill_to_order(symbol.id, fill.buyer_order_id, fill.quantity).await?;
            self.apply_fill_to_order(symbol.id, fill.seller_order_id, fill.quantity).await?;

            self.apply_position(symbol.id, fill.buyer_order_id, buyer_row.team_id, Side::Buy, fill.quantity, trade.price)
                .await?;
            self.apply_position(symbol.id, fill.seller_order_id, seller_row.team_id, Side::Sell, fill.quantity, trade.price)
                .await?;

            trade_rows.push(trade);
        }

        for cancel in &outcome.stp_cancellations {
            warn!(
                resting_order_id = %cancel.resting_order_id,
                quantity = cancel.cancelled_quantity,
                "self-trade prevention cancelled resting quantity"
            );
            metrics::record_stp_cancellation(&symbol.code);
            self.apply_cancellation_to_order(symbol.id, cancel.resting_order_id, cancel.cancelled_quantity)
                .await?;
        }

        let final_status = match order.order_type {
            OrderType::Market => {
                if outcome.incoming_filled >= order.quantity {
                    OrderStatus::Filled
                } else {
                    OrderStatus::Cancelled
                }
            }
            OrderType::Limit => OrderStatus::from_fill(outcome.incoming_filled, order.quantity),
        };
        store::apply_fill(&self.pool, order.id, outcome.incoming_filled, final_status).await?;
        if let Some(entry) = self.books.get(&symbol.id) {
            let mut book = entry.value().lock();
            if final_status.is_terminal() {
                book.model_by_id.remove(&order.id);
            } else {
                let mut row = order.clone();
                row.filled_quantity = outcome.incoming_filled;
                row.status = final_status;
                book.model_by_id.insert(order.id, row);
            }
        }

        Ok((trade_rows, final_status))
    }

    async fn resolve_order(&self, symbol_id: Uuid, order_id: Uuid, just_inserted: &Order) -> CoreResult<Order> {
        if order_id == just_inserted.id {
            return Ok(just_inserted.clone());
        }
        if let Some(entry) = self.books.get(&symbol_id) {
            if let Some(row) = entry.value().lock().model_by_id.get(&order_id) {
                return Ok(row.clone());
            }
        }
        store::find_order(&self.pool, order_id).await
    }

    async fn apply_fill_to_order(&self, symbol_id: Uuid, order_id: Uuid, quantity: i64) -> CoreResult<()> {
        let row = store::find_order(&self.pool, order_id).await?;
        let filled = row.filled_quantity + quantity;
        let status = OrderStatus::from_fill(filled, row.quantity);
        store::apply_fill(&self.pool, order_id, filled, status).await?;
        if let Some(entry) = self.books.get(&symbol_id) {
            let mut book = entry.value().lock();
            if status.is_terminal() {
                book.model_by_id.remove(&order_id);
            } else if let Some(cached) = book.model_by_id.get_mut(&order_id) {
                cached.filled_quantity = filled;
                cached.status = status;
            }
        }
        Ok(())
    }

    /// Self-trade-prevention cancellations are recorded as a forced
    /// consumption of `filled_quantity` rather than a distinct column —
    /// a cancelled resting order reaches the same terminal state a full
    /// fill would.
    async fn apply_cancellation_to_order(&self, symbol_id: Uuid, order_id: Uuid, cancelled_quantity: i64) -> CoreResult<()> {
        let row = store::find_order(&self.pool, order_id).await?;
        let filled = row.filled_quantity + cancelled_quantity;
        let status = if filled >= row.quantity {
            OrderStatus::Cancelled
        } else {
            OrderStatus::Partial
        };
        store::apply_fill(&self.pool, order_id, filled, status).await?;
        if let Some(entry) = self.books.get(&symbol_id) {
            entry.value().lock().model_by_id.remove(&order_id);
        }
        Ok(())
    }

    async fn apply_position(&self, symbol_id: Uuid, _order_id: Uuid, team_id: Uuid, side: Side, quantity: i64, price: Decimal) -> CoreResult<()> {
        let mut position = store::find_position(&self.pool, team_id, symbol_id).await?;
        apply_trade_to_position(&mut position, side, quantity, price);
        store::upsert_position(&self.pool, &position).await?;
        Ok(())
    }

    /// Drop any book cache entries for rows that reached a terminal state.
    async fn reconcile_terminal(&self, symbol_id: Uuid) {
        if let Some(entry) = self.books.get(&symbol_id) {
            entry.value().lock().model_by_id.retain(|_, row| !row.status.is_terminal());
        }
    }

    async fn emit_book_update(&self, symbol: &Symbol, symbol_id: Uuid) {
        let depth = self.depth_for(symbol_id, self.depth_n);
        metrics::set_orderbook_depth(&symbol.code, "bid", depth.bids.iter().map(|l| l.quantity).sum());
        metrics::set_orderbook_depth(&symbol.code, "ask", depth.asks.iter().map(|l| l.quantity).sum());
        self.notifier.notify_book(BookUpdate {
            symbol: symbol.code.clone(),
            bids: depth.bids.iter().map(|l| BookLevel { price: l.price, quantity: l.quantity }).collect(),
            asks: depth.asks.iter().map(|l| BookLevel { price: l.price, quantity: l.quantity }).collect(),
            ts: Utc::now(),
        });
    }

    fn depth_for(&self, symbol_id: Uuid, n: usize) -> BookDepth {
        match self.books.get(&symbol_id) {
            Some(entry) => entry.value().lock().engine.depth(n),
            None => BookDepth { bids: Vec::new(), asks: Vec::new() },
        }
    }

    /// Proxy to the engine; empty when not loaded.
    pub async fn depth(&self, symbol_code: &str, n: usize) -> CoreResult<BookDepth> {
        let symbol = store::find_symbol_by_code(&self.pool, symbol_code).await?;
        self.ensure_loaded(symbol.id, &[]).await?;
        Ok(self.depth_for(symbol.id, n))
    }

    /// A cancel on an order already `filled` or `cancelled` is a no-op
    /// (idempotent cancellation).
    pub async fn cancel_order(&self, order_id: Uuid) -> CoreResult<()> {
        let row = store::find_order(&self.pool, order_id).await?;
        if row.status.is_terminal() {
            return Ok(());
        }
        store::mark_cancelled(&self.pool, order_id).await?;
        if let Some(entry) = self.books.get(&row.symbol_id) {
            let mut book = entry.value().lock();
            book.engine.remove_order(order_id);
            book.model_by_id.remove(&order_id);
        }
        if let Ok(symbol) = store::find_symbol_by_id(&self.pool, row.symbol_id).await {
            metrics::record_order_cancelled(&symbol.code);
            self.emit_book_update(&symbol, row.symbol_id).await;
        }
        info!(order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// Discard engine state so the next operation
    /// rebuilds from the store. Used on durable-write failure
    /// and available for operator-driven recovery.
    pub fn reset_book(&self, symbol_id: Uuid) {
        self.books.remove(&symbol_id);
    }

    /// Settlement:
    /// mark the symbol halted and convert every open position into
    /// realized PnL at the settlement price.
    pub async fn settle_symbol(&self, symbol_code: &str, price: Decimal) -> CoreResult<()> {
        let symbol = store::find_symbol_by_code(&self.pool, symbol_code).await?;
        store::settle_symbol(&self.pool, symbol.id, price).await?;
        let positions = store::all_positions_for_symbol(&self.pool, symbol.id).await?;
        for mut position in positions {
            settle_position(&mut position, price);
            store::upsert_position(&self.pool, &position).await?;
        }
        self.reset_book(symbol.id);
        metrics::record_settlement(&symbol.code);
        info!(symbol = %symbol_code, price = %price, "symbol settled");
        Ok(())
    }

    /// Operator `pause`: halt one symbol, or every symbol when
    /// `symbol_code` is `None`. New orders are rejected per §3 invariant 6
    /// once `trading_halted` is set; resting liquidity is left untouched
    /// (pause is not a cancel-all).
    pub async fn pause_symbol(&self, symbol_code: Option<&str>) -> CoreResult<()> {
        match symbol_code {
            Some(code) => {
                let symbol = store::find_symbol_by_code(&self.pool, code).await?;
                store::set_trading_halted(&self.pool, Some(symbol.id), true).await?;
                info!(symbol = %code, "trading halted");
            }
            None => {
                store::set_trading_halted(&self.pool, None, true).await?;
                info!("trading halted for all symbols");
            }
        }
        Ok(())
    }

    /// Operator `start`: lift a halt on one symbol, or every symbol when
    /// `symbol_code` is `None`. Never lifts `settlement_active` — a
    /// settled symbol stays halted until an operator re-activates it
    /// through the out-of-scope admin surface.
    pub async fn start_symbol(&self, symbol_code: Option<&str>) -> CoreResult<()> {
        match symbol_code {
            Some(code) => {
                let symbol = store::find_symbol_by_code(&self.pool, code).await?;
                store::set_trading_halted(&self.pool, Some(symbol.id), false).await?;
                info!(symbol = %code, "trading resumed");
            }
            None => {
                store::set_trading_halted(&self.pool, None, false).await?;
                info!("trading resumed for all symbols");
            }
        }
        Ok(())
    }
}
