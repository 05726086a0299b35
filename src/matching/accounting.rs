//! Position & PnL accounting.
//!
//! Weighted-average-cost arithmetic with short-covering and long/short
//! reversal, expressed as a pure function over the `Position` model.
//! Settlement is a terminal mark-to-price pass over every open position,
//! converting it to realized PnL at an operator-supplied price.

use rust_decimal::Decimal;

use crate::models::order::Side;
use crate::models::position::Position;

/// Apply one fill to a position in place. `side` is this team's side of
/// the trade (`buy` for the buyer's row, `sell` for the seller's).
pub fn apply_trade_to_position(pos: &mut Position, side: Side, quantity: i64, price: Decimal) {
    let q = Decimal::from(quantity);
    match side {
        Side::Buy => apply_buy(pos, quantity, q, price),
        Side::Sell => apply_sell(pos, quantity, q, price),
    }
}

fn apply_buy(pos: &mut Position, quantity: i64, q: Decimal, price: Decimal) {
    if pos.quantity >= 0 {
        pos.average_price = Some(match pos.average_price {
            Some(avg) if pos.quantity > 0 => {
                (avg * Decimal::from(pos.quantity) + price * q) / Decimal::from(pos.quantity + quantity)
            }
            _ => price,
        });
        pos.quantity += quantity;
        return;
    }

    // qty < 0: covering a short.
    let short_qty = -pos.quantity;
    let covered = quantity.min(short_qty);
    let avg = pos.average_price.expect("short position always carries an average price");
    pos.realized_pnl += (avg - price) * Decimal::from(covered);
    pos.quantity += covered;
    if pos.quantity == 0 {
        pos.average_price = None;
    }
    let remainder = quantity - covered;
    if remainder > 0 {
        pos.average_price = Some(price);
        pos.quantity = remainder;
    }
}

fn apply_sell(pos: &mut Position, quantity: i64, q: Decimal, price: Decimal) {
    if pos.quantity <= 0 {
        let short_qty = -pos.quantity;
        pos.average_price = Some(match pos.average_price {
            Some(avg) if pos.quantity < 0 => {
                (avg * Decimal::from(short_qty) + price * q) / Decimal::from(short_qty + quantity)
            }
            _ => price,
        });
        pos.quantity -= quantity;
        return;
    }

    // qty > 0: reducing a long.
    let reduced = quantity.min(pos.quantity);
    let avg = pos.average_price.expect("long position always carries an average price");
    pos.realized_pnl += (price - avg) * Decimal::from(reduced);
    pos.quantity -= reduced;
    if pos.quantity == 0 {
        pos.average_price = None;
    }
    let remainder = quantity - reduced;
    if remainder > 0 {
        pos.average_price = Some(price);
        pos.quantity = -remainder;
    }
}

/// Settle a position at a fixed symbol price, converting the remaining
/// open quantity into realized PnL. The symbol's `trading_halted` flag is
/// the caller's responsibility to set.
pub fn settle_position(pos: &mut Position, settlement_price: Decimal) {
    if pos.quantity == 0 {
        return;
    }
    let avg = pos
        .average_price
        .expect("non-zero position always carries an average price");
    if pos.quantity > 0 {
        pos.realized_pnl += (settlement_price - avg) * Decimal::from(pos.quantity);
    } else {
        pos.realized_pnl += (avg - settlement_price) * Decimal::from(-pos.quantity);
    }
    pos.quantity = 0;
    pos.average_price = None;
}
