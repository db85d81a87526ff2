//! In-memory view counter.

use eventhub_core::stats::{aggregate_hits, Hit, NewHit, StatsQuery, UriStats, ViewStats};
use eventhub_core::{DomainError, Result};
use futures::future::BoxFuture;
use tokio::sync::RwLock;

/// Keeps hits in a vector and aggregates on read
#[derive(Default)]
pub struct InMemoryViewStats {
    hits: RwLock<Vec<Hit>>,
    unavailable: bool,
}

impl InMemoryViewStats {
    /// Creates an empty counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter that fails every call with `Unavailable`
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            hits: RwLock::new(Vec::new()),
            unavailable: true,
        }
    }

    /// Snapshot of recorded hits
    pub async fn recorded(&self) -> Vec<Hit> {
        self.hits.read().await.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable {
            return Err(DomainError::Unavailable("view stats are offline".to_string()));
        }
        Ok(())
    }
}

impl ViewStats for InMemoryViewStats {
    fn record_hit(&self, hit: NewHit) -> BoxFuture<'_, Result<Hit>> {
        Box::pin(async move {
            self.check_available()?;
            hit.validate()?;
            let mut hits = self.hits.write().await;
            let id = i64::try_from(hits.len()).map_err(DomainError::storage)? + 1;
            let stored = Hit::from_new(id, hit);
            hits.push(stored.clone());
            Ok(stored)
        })
    }

    fn stats(&self, query: StatsQuery) -> BoxFuture<'_, Result<Vec<UriStats>>> {
        Box::pin(async move {
            self.check_available()?;
            query.validate()?;
            Ok(aggregate_hits(self.hits.read().await.iter(), &query))
        })
    }
}
