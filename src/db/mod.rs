//! Durable store access.
//!
//! `Database` wraps the connection pool (`Database::connect(&config.
//! database_url)`); `store` holds the queries the manager issues against
//! the `symbols`, `teams`, `orders`, `trades`, and `positions` tables.

pub mod store;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }
}
