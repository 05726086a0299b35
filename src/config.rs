//! Application configuration.
//!
//! Loaded once at process start from the environment (optionally seeded by
//! a `.env` file via `dotenvy`): plain `std::env::var` reads with defaults,
//! rather than a declarative config-file layer.

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub database_url: String,
    pub port: u16,

    /// Ticks per unit price for fixed-point price arithmetic.
    pub price_scale: i64,

    /// Default depth (`N`) for notifier book snapshots.
    pub default_depth: usize,

    /// Bounded channel capacity for the notifier fan-out task — a slow
    /// subscriber must not back up the matcher.
    pub notifier_channel_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            database_url: "postgres://localhost/exchange_core".to_string(),
            port: 8080,
            price_scale: 1_000_000,
            default_depth: 10,
            notifier_channel_capacity: 1024,
        }
    }
}

impl AppConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let environment = std::env::var("ENVIRONMENT").unwrap_or(defaults.environment);
        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);
        let price_scale = std::env::var("PRICE_SCALE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.price_scale);
        let default_depth = std::env::var("DEFAULT_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.default_depth);
        let notifier_channel_capacity = std::env::var("NOTIFIER_CHANNEL_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.notifier_channel_capacity);

        Ok(Self {
            environment,
            database_url,
            port,
            price_scale,
            default_depth,
            notifier_channel_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.price_scale, 1_000_000);
        assert_eq!(cfg.default_depth, 10);
    }
}
