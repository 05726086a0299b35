//! Per-symbol matching engine — the bulk of this crate's logic.
//!
//! A `BTreeMap` of price levels, each holding a `VecDeque` in
//! arrival order, plus a flat `order_id -> entry` index for O(1) cancel
//! and a `by_team` index for self-trade prevention. This engine is owned
//! exclusively by one per-symbol actor, so no internal locking is
//! needed here — callers serialize through the manager instead.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::Utc;
use uuid::Uuid;

use crate::matching::price::{BidKey, Ticks, MARKET_BUY_SENTINEL, MARKET_SELL_SENTINEL};
use crate::matching::types::{BookDepth, DepthLevel, Fill, IncomingOrder, MatchOutcome, RestingOrder, StpCancellation};
use crate::models::order::{OrderType, Side};

/// Price-time-priority book for a single symbol. Holds no reference to the
/// durable store or to any other symbol's state.
pub struct MatchingEngine {
    bids: BTreeMap<BidKey, VecDeque<RestingOrder>>,
    asks: BTreeMap<Ticks, VecDeque<RestingOrder>>,
    by_id: HashMap<Uuid, (Side, Ticks)>,
    by_team: HashMap<Uuid, (HashSet<Uuid>, HashSet<Uuid>)>,
    sequence: AtomicU64,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            by_id: HashMap::new(),
            by_team: HashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, AtomicOrdering::Relaxed)
    }

    fn team_entry(&mut self, team_id: Uuid) -> &mut (HashSet<Uuid>, HashSet<Uuid>) {
        self.by_team.entry(team_id).or_default()
    }

    fn team_side_mut(&mut self, team_id: Uuid, side: Side) -> &mut HashSet<Uuid> {
        let entry = self.team_entry(team_id);
        match side {
            Side::Buy => &mut entry.0,
            Side::Sell => &mut entry.1,
        }
    }

    /// Insert a known-open limit order without matching, used by the
    /// manager to rebuild state from the store.
    pub fn add_resting(&mut self, order: RestingOrder) {
        debug_assert!(order.remaining > 0);
        self.by_id.insert(order.id, (order.side, order.price));
        self.team_side_mut(order.team_id, order.side).insert(order.id);
        match order.side {
            Side::Buy => self.bids.entry(BidKey(order.price)).or_default().push_back(order),
            Side::Sell => self.asks.entry(order.price).or_default().push_back(order),
        }
    }

    /// Detach an entry from its level and indexes. Returns whether it was
    /// present.
    pub fn remove_order(&mut self, order_id: Uuid) -> bool {
        let Some((side, price)) = self.by_id.remove(&order_id) else {
            return false;
        };
        let level = match side {
            Side::Buy => self.bids.get_mut(&BidKey(price)),
            Side::Sell => self.asks.get_mut(&price),
        };
        if let Some(level) = level {
            if let Some(pos) = level.iter().position(|o| o.id == order_id) {
                let order = level.remove(pos).unwrap();
                self.team_side_mut(order.team_id, side).remove(&order_id);
                if level.is_empty() {
                    match side {
                        Side::Buy => {
                            self.bids.remove(&BidKey(price));
                        }
                        Side::Sell => {
                            self.asks.remove(&price);
                        }
                    }
                }
                return true;
            }
        }
        false
    }

    fn pop_if_exhausted(&mut self, side: Side, price: Ticks) {
        let empty = match side {
            Side::Buy => self.bids.get(&BidKey(price)).map(|l| l.is_empty()).unwrap_or(false),
            Side::Sell => self.asks.get(&price).map(|l| l.is_empty()).unwrap_or(false),
        };
        if empty {
            match side {
                Side::Buy => {
                    self.bids.remove(&BidKey(price));
                }
                Side::Sell => {
                    self.asks.remove(&price);
                }
            }
        }
    }

    /// The opposite side's book, keyed ascending by matching priority
    /// (best price first) regardless of side representation.
    fn opposite_prices_for(&self, incoming_side: Side) -> Vec<Ticks> {
        match incoming_side {
            // incoming buy matches asks, ascending price.
            Side::Buy => self.asks.keys().copied().collect(),
            // incoming sell matches bids; BidKey already orders descending
            // by price, which is exactly best-bid-first.
            Side::Sell => self.bids.keys().map(|k| k.0).collect(),
        }
    }

    fn crosses(incoming_side: Side, incoming_price: Ticks, level_price: Ticks) -> bool {
        match incoming_side {
            Side::Buy => incoming_price >= level_price,
            Side::Sell => incoming_price <= level_price,
        }
    }

    /// Cancel the incoming team's own resting quantity on the opposite
    /// side at crossing prices, in price priority order, before any
    /// matching happens. Returns cancellations and the quantity removed —
    /// the caller applies the market-order remainder reduction.
    fn stp_prepass(&mut self, incoming: &IncomingOrder) -> (Vec<StpCancellation>, i64) {
        let opposite_side = incoming.side.opposite();
        let has_self_resting = {
            let set = match opposite_side {
                Side::Buy => &self.team_entry(incoming.team_id).0,
                Side::Sell => &self.team_entry(incoming.team_id).1,
            };
            !set.is_empty()
        };
        if !has_self_resting {
            return (Vec::new(), 0);
        }

        let mut cancels = Vec::new();
        let mut remaining_budget = incoming.remaining;
        let mut total_cancelled = 0i64;

        for price in self.opposite_prices_for(incoming.side) {
            if remaining_budget <= 0 {
                break;
            }
            if !Self::crosses(incoming.side, incoming.price, price) {
                break;
            }
            let level = match opposite_side {
                Side::Buy => self.bids.get_mut(&BidKey(price)),
                Side::Sell => self.asks.get_mut(&price),
            };
            let Some(level) = level else { continue };

            let mut exhausted_ids = Vec::new();
            for entry in level.iter_mut() {
                if remaining_budget <= 0 {
                    break;
                }
                if entry.team_id != incoming.team_id {
                    continue;
                }
                let reduction = remaining_budget.min(entry.remaining);
                if reduction <= 0 {
                    continue;
                }
                entry.remaining -= reduction;
                remaining_budget -= reduction;
                total_cancelled += reduction;
                cancels.push(StpCancellation {
                    resting_order_id: entry.id,
                    team_id: entry.team_id,
                    cancelled_quantity: reduction,
                });
                if entry.remaining == 0 {
                    exhausted_ids.push(entry.id);
                }
            }
            level.retain(|o| o.remaining > 0);
            for id in exhausted_ids {
                self.team_side_mut(incoming.team_id, opposite_side).remove(&id);
                self.by_id.remove(&id);
            }
            self.pop_if_exhausted(opposite_side, price);
        }

        (cancels, total_cancelled)
    }

    /// Match against whatever resting liquidity remains after the
    /// self-trade-prevention pass. `remaining` is mutated in place.
    ///
    /// A same-team entry is skipped in place rather than stopping the
    /// pass: STP only cancels `min(incoming, crossing_self_total)`, so a
    /// self entry larger than the incoming quantity can still sit ahead
    /// of tradeable cross-team liquidity at the same price. Skipping past
    /// it (instead of treating it as the end of the book) is what keeps
    /// that liquidity reachable and the resting book non-crossed.
    fn matching_pass(&mut self, incoming: &IncomingOrder, remaining: &mut i64) -> Vec<Fill> {
        let mut fills = Vec::new();
        let opposite_side = incoming.side.opposite();
        let prices = self.opposite_prices_for(incoming.side);

        for price in prices {
            if *remaining <= 0 {
                break;
            }
            if incoming.order_type == OrderType::Limit && !Self::crosses(incoming.side, incoming.price, price) {
                break;
            }

            loop {
                if *remaining <= 0 {
                    break;
                }
                let level = match opposite_side {
                    Side::Buy => self.bids.get_mut(&BidKey(price)),
                    Side::Sell => self.asks.get_mut(&price),
                };
                let Some(level) = level else { break };

                let Some(idx) = level.iter().position(|o| o.team_id != incoming.team_id) else {
                    // Everything left at this level belongs to the
                    // incoming team; STP already consumed what it could
                    // and the rest stays resting untouched.
                    break;
                };

                let quantity = (*remaining).min(level[idx].remaining);
                let entry = &level[idx];
                let (buyer_order_id, seller_order_id) = match incoming.side {
                    Side::Buy => (incoming.id, entry.id),
                    Side::Sell => (entry.id, incoming.id),
                };
                fills.push(Fill {
                    resting_order_id: entry.id,
                    resting_team_id: entry.team_id,
                    incoming_order_id: incoming.id,
                    incoming_team_id: incoming.team_id,
                    buyer_order_id,
                    seller_order_id,
                    price,
                    quantity,
                    executed_at: Utc::now(),
                });

                *remaining -= quantity;
                level[idx].remaining -= quantity;
                if level[idx].remaining == 0 {
                    let exhausted = level.remove(idx).unwrap();
                    self.by_id.remove(&exhausted.id);
                    self.team_side_mut(exhausted.team_id, opposite_side).remove(&exhausted.id);
                }
                self.pop_if_exhausted(opposite_side, price);
            }
        }

        fills
    }

    /// Run the full flow for an incoming order: STP pre-pass, matching
    /// pass, then rest-or-terminate.
    pub fn add_order(&mut self, incoming: IncomingOrder) -> MatchOutcome {
        let (stp_cancellations, stp_cancelled_qty) = self.stp_prepass(&incoming);

        let mut remaining = incoming.remaining;
        if incoming.order_type == OrderType::Market {
            remaining -= stp_cancelled_qty;
        }

        let fills = self.matching_pass(&incoming, &mut remaining);
        let incoming_filled: i64 = fills
            .iter()
            .filter(|f| f.incoming_order_id == incoming.id)
            .map(|f| f.quantity)
            .sum();

        let resting = match incoming.order_type {
            OrderType::Market => false,
            OrderType::Limit => {
                if remaining > 0 {
                    let sequence = self.next_sequence();
                    self.add_resting(RestingOrder {
                        id: incoming.id,
                        team_id: incoming.team_id,
                        side: incoming.side,
                        price: incoming.price,
                        remaining,
                        sequence,
                    });
                    true
                } else {
                    false
                }
            }
        };

        MatchOutcome {
            fills,
            stp_cancellations,
            incoming_filled,
            incoming_remaining: remaining,
            resting,
        }
    }

    /// Up to `n` best levels per side as `(price, aggregate_quantity)` in
    /// priority order.
    pub fn depth(&self, n: usize) -> BookDepth {
        let bids = self
            .bids
            .iter()
            .take(n)
            .map(|(key, level)| DepthLevel {
                price: key.0.to_decimal(),
                quantity: level.iter().map(|o| o.remaining).sum(),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(n)
            .map(|(price, level)| DepthLevel {
                price: price.to_decimal(),
                quantity: level.iter().map(|o| o.remaining).sum(),
            })
            .collect();
        BookDepth { bids, asks }
    }

    pub fn has_order(&self, order_id: Uuid) -> bool {
        self.by_id.contains_key(&order_id)
    }
}

pub fn market_sentinel(side: Side) -> Ticks {
    match side {
        Side::Buy => MARKET_BUY_SENTINEL,
        Side::Sell => MARKET_SELL_SENTINEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn incoming(side: Side, order_type: OrderType, team: Uuid, price: rust_decimal::Decimal, qty: i64) -> IncomingOrder {
        let price = match order_type {
            OrderType::Market => market_sentinel(side),
            OrderType::Limit => Ticks::from_decimal(price),
        };
        IncomingOrder {
            id: Uuid::new_v4(),
            team_id: team,
            side,
            order_type,
            price,
            remaining: qty,
        }
    }

    fn rest(engine: &mut MatchingEngine, side: Side, team: Uuid, price: rust_decimal::Decimal, qty: i64) -> Uuid {
        let id = Uuid::new_v4();
        let sequence = engine.next_sequence();
        engine.add_resting(RestingOrder {
            id,
            team_id: team,
            side,
            price: Ticks::from_decimal(price),
            remaining: qty,
            sequence,
        });
        id
    }

    #[test]
    fn limit_match_with_price_improvement() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        rest(&mut engine, Side::Sell, team_b, dec!(100.00), 80);

        let order = incoming(Side::Buy, OrderType::Limit, team_a, dec!(101.00), 100);
        let outcome = engine.add_order(order);

        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].quantity, 80);
        assert_eq!(outcome.fills[0].price.to_decimal(), dec!(100.00));
        assert_eq!(outcome.incoming_filled, 80);
        assert_eq!(outcome.incoming_remaining, 20);
        assert!(outcome.resting);

        let depth = engine.depth(10);
        assert_eq!(depth.bids.len(), 1);
        assert_eq!(depth.bids[0].price, dec!(101.00));
        assert_eq!(depth.bids[0].quantity, 20);
        assert!(depth.asks.is_empty());
    }

    #[test]
    fn market_buy_sweeps_two_levels_and_cancels_remainder() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        rest(&mut engine, Side::Sell, team_b, dec!(100.00), 50);
        rest(&mut engine, Side::Sell, team_b, dec!(101.00), 100);

        let order = incoming(Side::Buy, OrderType::Market, team_a, dec!(0), 200);
        let outcome = engine.add_order(order);

        assert_eq!(outcome.fills.len(), 2);
        assert_eq!(outcome.fills[0].quantity, 50);
        assert_eq!(outcome.fills[0].price.to_decimal(), dec!(100.00));
        assert_eq!(outcome.fills[1].quantity, 100);
        assert_eq!(outcome.fills[1].price.to_decimal(), dec!(101.00));
        assert_eq!(outcome.incoming_filled, 150);
        assert!(!outcome.resting);

        let depth = engine.depth(10);
        assert!(depth.bids.is_empty());
        assert!(depth.asks.is_empty());
    }

    #[test]
    fn stp_cancels_self_then_trades_other_rests_remainder() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let self_sell = rest(&mut engine, Side::Sell, team_a, dec!(100.00), 40);
        rest(&mut engine, Side::Sell, team_b, dec!(100.00), 60);

        let order = incoming(Side::Buy, OrderType::Limit, team_a, dec!(110.00), 70);
        let outcome = engine.add_order(order);

        assert_eq!(outcome.stp_cancellations.len(), 1);
        assert_eq!(outcome.stp_cancellations[0].resting_order_id, self_sell);
        assert_eq!(outcome.stp_cancellations[0].cancelled_quantity, 40);

        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].quantity, 60);
        assert_eq!(outcome.fills[0].price.to_decimal(), dec!(100.00));

        assert_eq!(outcome.incoming_filled, 60);
        assert_eq!(outcome.incoming_remaining, 10);
        assert!(outcome.resting);

        let depth = engine.depth(10);
        assert_eq!(depth.bids[0].price, dec!(110.00));
        assert_eq!(depth.bids[0].quantity, 10);
        assert!(depth.asks.is_empty());
    }

    #[test]
    fn stp_with_only_self_liquidity_market_order() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let self_sell = rest(&mut engine, Side::Sell, team_a, dec!(100.00), 100);

        let order = incoming(Side::Buy, OrderType::Market, team_a, dec!(0), 30);
        let outcome = engine.add_order(order);

        assert_eq!(outcome.stp_cancellations.len(), 1);
        assert_eq!(outcome.stp_cancellations[0].resting_order_id, self_sell);
        assert_eq!(outcome.stp_cancellations[0].cancelled_quantity, 30);
        assert!(outcome.fills.is_empty());
        assert_eq!(outcome.incoming_remaining, 0);
        assert!(!outcome.resting);

        let depth = engine.depth(10);
        assert_eq!(depth.asks[0].price, dec!(100.00));
        assert_eq!(depth.asks[0].quantity, 70);
    }

    #[test]
    fn limit_priced_away_rests_with_zero_trades_and_cancels() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        rest(&mut engine, Side::Sell, team_b, dec!(100.00), 10);

        let order = incoming(Side::Buy, OrderType::Limit, team_a, dec!(90.00), 5);
        let outcome = engine.add_order(order);

        assert!(outcome.fills.is_empty());
        assert!(outcome.stp_cancellations.is_empty());
        assert!(outcome.resting);
    }

    #[test]
    fn remove_order_reports_presence() {
        let mut engine = MatchingEngine::new();
        let team = Uuid::new_v4();
        let id = rest(&mut engine, Side::Buy, team, dec!(50.00), 10);
        assert!(engine.remove_order(id));
        assert!(!engine.remove_order(id));
    }

    /// A self entry ahead of cross-team liquidity at the same price must
    /// not block matching against that liquidity once STP has taken what
    /// it can: team A rests 100 @100.00 before team B rests 50 @100.00,
    /// so A's own entry sits at the front of the level. An incoming A buy
    /// for 30 is smaller than A's own resting quantity, so STP cancels
    /// only 30 of it (leaving 70 resting) and the incoming must still
    /// reach B's entry behind it rather than resting on top of a crossed
    /// book.
    #[test]
    fn self_entry_ahead_of_cross_team_liquidity_is_skipped_not_blocking() {
        let mut engine = MatchingEngine::new();
        let team_a = Uuid::new_v4();
        let team_b = Uuid::new_v4();
        let self_sell = rest(&mut engine, Side::Sell, team_a, dec!(100.00), 100);
        rest(&mut engine, Side::Sell, team_b, dec!(100.00), 50);

        let order = incoming(Side::Buy, OrderType::Limit, team_a, dec!(100.00), 30);
        let outcome = engine.add_order(order);

        assert_eq!(outcome.stp_cancellations.len(), 1);
        assert_eq!(outcome.stp_cancellations[0].resting_order_id, self_sell);
        assert_eq!(outcome.stp_cancellations[0].cancelled_quantity, 30);

        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].quantity, 30);
        assert_eq!(outcome.fills[0].price.to_decimal(), dec!(100.00));
        assert_eq!(outcome.incoming_filled, 30);
        assert_eq!(outcome.incoming_remaining, 0);
        assert!(!outcome.resting);

        let depth = engine.depth(10);
        assert_eq!(depth.asks.len(), 1);
        assert_eq!(depth.asks[0].price, dec!(100.00));
        assert_eq!(depth.asks[0].quantity, 70);
        assert!(depth.bids.is_empty());
    }
}
