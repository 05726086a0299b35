//! Per-team, per-symbol position and its PnL.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Per-(team, symbol) position. `average_price` is `None` iff `quantity ==
/// 0`; positive `quantity` is long, negative is short.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub team_id: Uuid,
    pub symbol_id: Uuid,
    pub quantity: i64,
    pub average_price: Option<Decimal>,
    pub realized_pnl: Decimal,
}

impl Position {
    pub fn flat(team_id: Uuid, symbol_id: Uuid) -> Self {
        Self {
            team_id,
            symbol_id,
            quantity: 0,
            average_price: None,
            realized_pnl: Decimal::ZERO,
        }
    }

    /// Read-side unrealized PnL against the latest trade price; never
    /// stored.
    pub fn unrealized_pnl(&self, last: Decimal) -> Decimal {
        match self.average_price {
            Some(avg) => (last - avg) * Decimal::from(self.quantity),
            None => Decimal::ZERO,
        }
    }

    pub fn invariant_holds(&self) -> bool {
        (self.average_price.is_none()) == (self.quantity == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_position_satisfies_invariant() {
        let pos = Position::flat(Uuid::new_v4(), Uuid::new_v4());
        assert!(pos.invariant_holds());
    }

    #[test]
    fn unrealized_pnl_is_sign_correct_for_long_and_short() {
        let mut pos = Position::flat(Uuid::new_v4(), Uuid::new_v4());
        pos.quantity = 10;
        pos.average_price = Some(dec!(100));
        assert_eq!(pos.unrealized_pnl(dec!(110)), dec!(100));

        pos.quantity = -10;
        assert_eq!(pos.unrealized_pnl(dec!(110)), dec!(-100));
    }
}
