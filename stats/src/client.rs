//! HTTP client for the stats service.
//!
//! Implements [`ViewStats`] so the main service can swap it for the
//! in-memory counter in tests.

use eventhub_core::stats::{Hit, NewHit, StatsQuery, UriStats, ViewStats};
use eventhub_core::types::timestamp;
use eventhub_core::{DomainError, Result};
use eventhub_web::error::ErrorBody;
use futures::future::BoxFuture;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// [`ViewStats`] backed by a remote stats service
#[derive(Debug, Clone)]
pub struct HttpStatsClient {
    http_client: Client,
    base_url: String,
}

impl HttpStatsClient {
    /// Creates a client with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::Unavailable(format!("failed to build stats client: {e}")))?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Wraps an existing `reqwest` client
    #[must_use]
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Query pairs for `GET /stats`; each uri is sent as its own `uris` pair
fn query_pairs(query: &StatsQuery) -> Vec<(&'static str, String)> {
    let mut pairs = vec![
        ("start", timestamp::format(&query.start)),
        ("end", timestamp::format(&query.end)),
        ("unique", query.unique.to_string()),
    ];
    pairs.extend(query.uris.iter().map(|uri| ("uris", uri.clone())));
    pairs
}

fn transport_error(e: &reqwest::Error) -> DomainError {
    DomainError::Unavailable(format!("stats service unreachable: {e}"))
}

/// Maps the response to a value or a domain error.
///
/// A `400` carries the remote validation message; any other failure means the
/// service cannot currently answer.
async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(|e| transport_error(&e));
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::BAD_REQUEST {
        let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |error| error.message);
        return Err(DomainError::validation(message));
    }

    tracing::warn!(%status, body = %body, "Stats service returned an error");
    Err(DomainError::Unavailable(format!("stats service returned {status}")))
}

impl ViewStats for HttpStatsClient {
    fn record_hit(&self, hit: NewHit) -> BoxFuture<'_, Result<Hit>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(self.url("/hit"))
                .json(&hit)
                .send()
                .await
                .map_err(|e| transport_error(&e))?;
            read_response(response).await
        })
    }

    fn stats(&self, query: StatsQuery) -> BoxFuture<'_, Result<Vec<UriStats>>> {
        Box::pin(async move {
            let response = self
                .http_client
                .get(self.url("/stats"))
                .query(&query_pairs(&query))
                .send()
                .await
                .map_err(|e| transport_error(&e))?;
            read_response(response).await
        })
    }
}
