//! Binary entrypoint: wires tracing, configuration, the durable store,
//! and the order-book manager. The HTTP/WebSocket façade and auth are not
//! part of this core; a real deployment links this crate into a separate
//! façade binary that wires in its own routing and auth layers.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use exchange_core::config::AppConfig;
use exchange_core::db::Database;
use exchange_core::matching::OrderBookManager;
use exchange_core::notifier::BroadcastNotifier;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exchange_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("starting exchange-core v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.environment, "configuration loaded");

    let db = Database::connect(&config.database_url).await?;
    tracing::info!("database connected");

    let _metrics_handle = exchange_core::metrics::init_metrics();
    tracing::info!("metrics recorder installed");

    let notifier = Arc::new(BroadcastNotifier::new(config.notifier_channel_capacity));
    let manager = Arc::new(OrderBookManager::new(db.pool.clone(), notifier.clone(), config.default_depth));

    // A real deployment hands `manager` to the per-symbol actor dispatch
    // layer and `notifier` to the market-data fan-out task; both live in
    // the façade process.
    let _ = manager;

    tracing::info!("exchange core initialized; awaiting façade wiring");
    Ok(())
}
