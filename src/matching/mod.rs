//! Matching core: price arithmetic, the per-symbol engine, the
//! order-book manager, and position/PnL accounting.

pub mod accounting;
pub mod engine;
pub mod manager;
pub mod price;
pub mod types;

pub use accounting::apply_trade_to_position;
pub use engine::MatchingEngine;
pub use manager::OrderBookManager;
