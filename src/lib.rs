//! Exchange core: matching engine, order-book manager, and position/PnL
//! accounting for a multi-symbol continuous-limit-order-book exchange.
//!
//! The HTTP/WebSocket façade, authentication, and the durable store's
//! schema migrations live outside this crate; it consumes the store
//! through [`db::store`] and produces market data through
//! [`notifier::MarketDataNotifier`].

pub mod config;
pub mod db;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod models;
pub mod notifier;

pub use error::{CoreError, CoreResult};
