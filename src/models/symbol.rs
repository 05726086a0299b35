//! Symbol model: the tradable instrument row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "symbol_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SymbolCategory {
    Equity,
    Etf,
    Option,
}

/// A tradable instrument. `underlying_id` forms a DAG with other symbols
/// (e.g. an option referencing its underlying equity); the core never
/// walks this edge — cycle prevention belongs to the admin-CRUD surface,
/// out of scope here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Symbol {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub category: SymbolCategory,
    pub underlying_id: Option<Uuid>,
    pub tick_size: Decimal,
    pub lot_size: i32,
    pub trading_halted: bool,
    pub settlement_active: bool,
    pub settlement_price: Option<Decimal>,
}

impl Symbol {
    /// No new order is accepted while halted or settling.
    pub fn is_tradable(&self) -> bool {
        !self.trading_halted && !self.settlement_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Symbol {
        Symbol {
            id: Uuid::new_v4(),
            code: "AAPL".to_string(),
            name: "Apple Inc.".to_string(),
            category: SymbolCategory::Equity,
            underlying_id: None,
            tick_size: Decimal::new(1, 2),
            lot_size: 1,
            trading_halted: false,
            settlement_active: false,
            settlement_price: None,
        }
    }

    #[test]
    fn tradable_when_active_and_not_halted() {
        assert!(sample().is_tradable());
    }

    #[test]
    fn not_tradable_when_halted() {
        let mut s = sample();
        s.trading_halted = true;
        assert!(!s.is_tradable());
    }

    #[test]
    fn not_tradable_when_settling() {
        let mut s = sample();
        s.settlement_active = true;
        assert!(!s.is_tradable());
    }
}
