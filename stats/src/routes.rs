//! HTTP endpoints of the stats service.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use eventhub_core::stats::{Hit, NewHit, StatsQuery, UriStats, ViewStats};
use eventhub_web::{correlation_id, handlers::health_check, AppError, AppJson, QueryPairs, WebResult};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Builds the stats router over any hit backend.
pub fn router(stats: Arc<dyn ViewStats>) -> Router {
    Router::new()
        .route("/hit", post(record_hit))
        .route("/stats", get(get_stats))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(stats)
}

/// `POST /hit`
async fn record_hit(
    State(stats): State<Arc<dyn ViewStats>>,
    AppJson(hit): AppJson<NewHit>,
) -> WebResult<(StatusCode, Json<Hit>)> {
    let stored = stats.record_hit(hit).await?;
    tracing::debug!(id = stored.id, app = %stored.app, uri = %stored.uri, "Hit recorded");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /stats?start=..&end=..&uris=..&unique=..`
async fn get_stats(
    State(stats): State<Arc<dyn ViewStats>>,
    pairs: QueryPairs,
) -> WebResult<Json<Vec<UriStats>>> {
    let query = stats_query(&pairs)?;
    tracing::debug!(
        start = %query.start,
        end = %query.end,
        uris = query.uris.len(),
        unique = query.unique,
        "Aggregating hits"
    );
    Ok(Json(stats.stats(query).await?))
}

/// Reads the stats window.
///
/// `uris` may be repeated (`uris=/a&uris=/b`) or comma separated
/// (`uris=/a,/b`); both forms can be mixed.
fn stats_query(pairs: &QueryPairs) -> Result<StatsQuery, AppError> {
    let query = StatsQuery {
        start: pairs
            .timestamp("start")?
            .ok_or_else(|| AppError::bad_request("start is required"))?,
        end: pairs
            .timestamp("end")?
            .ok_or_else(|| AppError::bad_request("end is required"))?,
        uris: pairs.values("uris").map(ToString::to_string).collect(),
        unique: pairs.parse_value("unique")?.unwrap_or(false),
    };
    query.validate()?;
    Ok(query)
}
