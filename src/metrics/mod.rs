//! Metrics for the exchange core: order submission/matching/cancellation,
//! trade execution, self-trade-prevention cancellations, book depth,
//! settlement, and database query latency.

#![allow(dead_code)]

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub mod names {
    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDER_MATCH_DURATION_SECONDS: &str = "order_match_duration_seconds";
    pub const TRADES_EXECUTED_TOTAL: &str = "trades_executed_total";
    pub const TRADE_VOLUME_TOTAL: &str = "trade_volume_total";
    pub const STP_CANCELLATIONS_TOTAL: &str = "stp_cancellations_total";

    pub const ORDERBOOK_DEPTH: &str = "orderbook_depth";

    pub const SETTLEMENTS_TOTAL: &str = "settlements_total";

    pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";
    pub const DB_CONNECTIONS_ACTIVE: &str = "db_connections_active";
    pub const DB_CONNECTIONS_IDLE: &str = "db_connections_idle";
}

pub mod labels {
    pub const SYMBOL: &str = "symbol";
    pub const ORDER_SIDE: &str = "side";
    pub const ORDER_TYPE: &str = "order_type";
    pub const QUERY_TYPE: &str = "query_type";
}

/// Initialize the Prometheus exporter. Returns a handle that can be
/// rendered by the out-of-scope HTTP façade.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::ORDER_MATCH_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::DB_QUERY_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0],
        )
        .unwrap();

    builder
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

pub fn record_order_submitted(symbol: &str, side: &str, order_type: &str) {
    counter!(
        names::ORDERS_SUBMITTED_TOTAL,
        labels::SYMBOL => symbol.to_string(),
        labels::ORDER_SIDE => side.to_string(),
        labels::ORDER_TYPE => order_type.to_string()
    )
    .increment(1);
}

pub fn record_order_cancelled(symbol: &str) {
    counter!(names::ORDERS_CANCELLED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_order_match_duration(duration_secs: f64) {
    histogram!(names::ORDER_MATCH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_trade_executed(symbol: &str, quantity: i64) {
    counter!(names::TRADES_EXECUTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
    counter!(names::TRADE_VOLUME_TOTAL, labels::SYMBOL => symbol.to_string()).increment(quantity.max(0) as u64);
}

pub fn record_stp_cancellation(symbol: &str) {
    counter!(names::STP_CANCELLATIONS_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn set_orderbook_depth(symbol: &str, side: &str, depth: i64) {
    gauge!(
        names::ORDERBOOK_DEPTH,
        labels::SYMBOL => symbol.to_string(),
        labels::ORDER_SIDE => side.to_string()
    )
    .set(depth as f64);
}

pub fn record_settlement(symbol: &str) {
    counter!(names::SETTLEMENTS_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
}

pub fn record_db_query(query_type: &str, duration_secs: f64) {
    histogram!(
        names::DB_QUERY_DURATION_SECONDS,
        labels::QUERY_TYPE => query_type.to_string()
    )
    .record(duration_secs);
}

pub fn set_db_connections(active: i64, idle: i64) {
    gauge!(names::DB_CONNECTIONS_ACTIVE).set(active as f64);
    gauge!(names::DB_CONNECTIONS_IDLE).set(idle as f64);
}

/// Timer for measuring operation durations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
