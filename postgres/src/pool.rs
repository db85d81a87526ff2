//! Connection pool settings.

use eventhub_core::{DomainError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::time::Duration;

/// `PostgreSQL` pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl PoolConfig {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`,
    /// `DATABASE_MIN_CONNECTIONS` and `DATABASE_CONNECT_TIMEOUT`.
    #[must_use]
    pub fn from_env(default_url: &str) -> Self {
        Self {
            url: env::var("DATABASE_URL").unwrap_or_else(|_| default_url.to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout: env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }

    /// Opens the pool.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unavailable`] if the database cannot be reached.
    pub async fn connect(&self) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::Unavailable(format!("failed to connect: {e}")))
    }

    /// The URL with credentials stripped, for logging
    #[must_use]
    pub fn redacted_url(&self) -> &str {
        self.url.rsplit('@').next().unwrap_or(&self.url)
    }
}
