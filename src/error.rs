//! Error taxonomy for the exchange core.
//!
//! Validation errors are returned as typed failures with no durable
//! side-effects. Durable errors roll back the caller's transaction and
//! invalidate the affected symbol's in-memory book so the next operation
//! rebuilds from the store. Internal invariant violations (a same-team
//! trade slipping past self-trade prevention, a negative fill) are not
//! represented here — they panic, since they indicate a bug in the engine
//! rather than a condition callers can recover from.

use uuid::Uuid;

/// Errors surfaced by the matching core to its callers.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("symbol not tradable: {0}")]
    SymbolNotTradable(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("order not found: {0}")]
    OrderNotFound(Uuid),

    #[error("durable store conflict on symbol {symbol}: {reason}")]
    DurableConflict { symbol: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    /// Classify a store-layer failure: a unique-index or foreign-key
    /// violation is a `DurableConflict` (a concurrent writer raced us),
    /// everything else is an opaque `Database` error. `context` is
    /// whatever identifies the affected row to the caller (a symbol code
    /// or id) for the log line.
    pub fn from_sqlx(context: impl Into<String>, err: sqlx::Error) -> CoreError {
        let is_conflict = err
            .as_database_error()
            .and_then(|e| e.code())
            .map(|code| code == "23505" || code == "23503")
            .unwrap_or(false);
        if is_conflict {
            CoreError::DurableConflict {
                symbol: context.into(),
                reason: err.to_string(),
            }
        } else {
            CoreError::Database(err)
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
