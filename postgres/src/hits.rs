//! `PostgreSQL` storage for view hits.

use crate::db_error;
use eventhub_core::stats::{Hit, NewHit, StatsQuery, UriStats, ViewStats};
use eventhub_core::{DomainError, Result};
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, QueryBuilder};

/// Hit log with grouped aggregation done in SQL
#[derive(Clone)]
pub struct PostgresHitStore {
    pool: PgPool,
}

impl PostgresHitStore {
    /// Creates a hit store over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| DomainError::Unavailable(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }

    /// Runs the hit table migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations_stats")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("migration failed: {e}")))?;
        Ok(())
    }
}

/// Builds the grouped stats query
fn stats_query(query: &StatsQuery) -> QueryBuilder<'_, Postgres> {
    let mut sql = QueryBuilder::new(if query.unique {
        "SELECT app, uri, COUNT(DISTINCT ip) AS hits FROM hits"
    } else {
        "SELECT app, uri, COUNT(*) AS hits FROM hits"
    });
    sql.push(" WHERE created >= ")
        .push_bind(query.start)
        .push(" AND created <= ")
        .push_bind(query.end);
    if !query.uris.is_empty() {
        sql.push(" AND uri = ANY(").push_bind(query.uris.clone()).push(")");
    }
    sql.push(" GROUP BY app, uri ORDER BY hits DESC, app, uri");
    sql
}

impl ViewStats for PostgresHitStore {
    #[tracing::instrument(skip(self, hit), fields(uri = %hit.uri))]
    fn record_hit(&self, hit: NewHit) -> BoxFuture<'_, Result<Hit>> {
        Box::pin(async move {
            hit.validate()?;
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO hits (app, uri, ip, created) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(&hit.app)
            .bind(&hit.uri)
            .bind(&hit.ip)
            .bind(hit.timestamp)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("insert hit"))?;

            metrics::counter!("eventhub_stats_hits_recorded_total").increment(1);
            Ok(Hit::from_new(id, hit))
        })
    }

    fn stats(&self, query: StatsQuery) -> BoxFuture<'_, Result<Vec<UriStats>>> {
        Box::pin(async move {
            query.validate()?;
            let rows: Vec<(String, String, i64)> = stats_query(&query)
                .build_query_as()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("aggregate hits"))?;

            rows.into_iter()
                .map(|(app, uri, hits)| {
                    let hits = u64::try_from(hits)
                        .map_err(|_| DomainError::storage(format!("negative hit count for {uri}")))?;
                    Ok(UriStats { app, uri, hits })
                })
                .collect()
        })
    }
}
