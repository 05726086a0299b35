//! Fixed-point price arithmetic.
//!
//! All internal prices are integers in tick units:
//! `to_ticks(price) = round(price * SCALE)`, `SCALE = 1_000_000` (six
//! decimal places). Market orders carry a sentinel tick value that
//! "crosses everything on its side" rather than a real price. Every
//! comparison in the matching hot path is on `Ticks`, never on `Decimal` —
//! integer arithmetic only, no floating-point comparisons anywhere near
//! the matching loop.

use rust_decimal::Decimal;
use std::cmp::Ordering;

pub const SCALE: i64 = 1_000_000;

/// Sentinel used for the "price" of a market order — it must compare as
/// crossing any resting limit price on its side. `i64::MAX` for a buy
/// (crosses any ask), `i64::MIN` for a sell (crosses any bid); the engine
/// never inserts this value into a price-level index (market orders never
/// rest).
pub const MARKET_BUY_SENTINEL: Ticks = Ticks(i64::MAX);
pub const MARKET_SELL_SENTINEL: Ticks = Ticks(i64::MIN);

/// An integer price in tick units. Ordered numerically; used as the key
/// of both the bid and ask price-level maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticks(i64);

impl Ticks {
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Convert an externally supplied decimal price to ticks, rounding to
    /// the nearest tick: accept as entered, round once.
    pub fn from_decimal(price: Decimal) -> Ticks {
        let scaled = price * Decimal::from(SCALE);
        let rounded = scaled.round();
        Ticks(rounded.try_into().unwrap_or(if rounded.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        }))
    }

    /// Convert back to an external decimal price (`ticks / SCALE`).
    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(SCALE)
    }
}

impl std::fmt::Display for Ticks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// Ordering key for the bid side, which is sorted by price *descending*
/// (highest first). Wrapping in `Reverse` at the `BTreeMap` call site
/// would work too, but a dedicated newtype keeps `engine.rs` readable
/// about which side it's iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidKey(pub Ticks);

impl PartialOrd for BidKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BidKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_trip_preserves_six_decimals() {
        let price = dec!(101.123456);
        let ticks = Ticks::from_decimal(price);
        assert_eq!(ticks.to_decimal(), price);
    }

    #[test]
    fn rounds_to_nearest_tick() {
        // 7th decimal digit rounds away.
        let ticks = Ticks::from_decimal(dec!(1.0000005));
        assert_eq!(ticks.to_decimal(), dec!(1.000001));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(Ticks::from_decimal(dec!(100)) < Ticks::from_decimal(dec!(101)));
    }

    #[test]
    fn bid_key_orders_descending() {
        let mut keys = vec![
            BidKey(Ticks::from_decimal(dec!(100))),
            BidKey(Ticks::from_decimal(dec!(102))),
            BidKey(Ticks::from_decimal(dec!(101))),
        ];
        keys.sort();
        assert_eq!(keys[0].0.to_decimal(), dec!(102));
        assert_eq!(keys[2].0.to_decimal(), dec!(100));
    }
}
