//! `PostgreSQL` backend for eventhub.
//!
//! Provides [`PostgresStore`], which implements every store trait from
//! `eventhub-core`, and [`PostgresHitStore`], the view-stats service's hit log.
//! Queries are checked at runtime, so building the crate needs no database.
//!
//! Capacity decisions happen inside a transaction holding a row lock on the
//! event; see [`store`] for the sequence.
//!
//! # Example
//!
//! ```ignore
//! use eventhub_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/eventhub", clock).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use eventhub_core::DomainError;

pub mod hits;
pub mod pool;
mod rows;
pub mod store;

pub use hits::PostgresHitStore;
pub use pool::PoolConfig;
pub use store::PostgresStore;

/// Maps a driver error to [`DomainError::Storage`], logging and counting it by `operation`
pub(crate) fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> DomainError {
    move |e| {
        tracing::error!(error = %e, operation, "Database error");
        metrics::counter!("eventhub_storage_errors_total", "operation" => operation).increment(1);
        DomainError::storage(format!("failed to {operation}: {e}"))
    }
}
