//! Anonymous endpoints.
//!
//! - GET /categories - List categories
//! - GET /categories/:cat_id - Get a category
//! - GET /events - Search published events
//! - GET /events/:id - Get a published event
//! - GET /compilations?pinned= - List compilations
//! - GET /compilations/:comp_id - Get a compilation
//!
//! Event reads are reported to the view counter.

use super::page;
use crate::dto::{CompilationDto, EventFull, EventShort, EventSort};
use crate::state::AppState;
use axum::{extract::State, http::Uri, Json};
use eventhub_core::stats::event_uri;
use eventhub_core::store::{EventFilter, EventHubStore};
use eventhub_core::types::{Category, CategoryId, CompilationId, EventId};
use eventhub_web::{AppPath, ClientIp, Pagination, QueryPairs, WebResult};
use std::sync::Arc;

/// `GET /categories?from=0&size=10`
pub async fn list_categories(
    State(state): State<AppState>,
    pagination: Pagination,
) -> WebResult<Json<Vec<Category>>> {
    let page = page(&state, pagination)?;
    Ok(Json(state.store.list_categories(page).await?))
}

/// `GET /categories/:cat_id`
pub async fn get_category(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(category_id): AppPath<CategoryId>,
) -> WebResult<Json<Category>> {
    Ok(Json(store.get_category(category_id).await?))
}

/// `GET /events?text=&categories=&paid=&rangeStart=&rangeEnd=&onlyAvailable=&sort=&from=&size=`
pub async fn search_events(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    uri: Uri,
    pairs: QueryPairs,
    pagination: Pagination,
) -> WebResult<Json<Vec<EventShort>>> {
    let filter = EventFilter {
        text: pairs.get("text").map(ToString::to_string),
        categories: pairs.list_with("categories", |raw| raw.parse::<i64>().map(CategoryId::new))?,
        paid: pairs.parse_value("paid")?,
        range_start: pairs.timestamp("rangeStart")?,
        range_end: pairs.timestamp("rangeEnd")?,
        only_available: pairs.parse_value("onlyAvailable")?.unwrap_or(false),
        ..EventFilter::default()
    };
    let sort = pairs.get("sort").map(EventSort::parse).transpose()?;
    let page = page(&state, pagination)?;

    let events = state.events.public_search(filter, sort, page).await?;
    state.events.record_hit(uri.path().to_string(), ip);
    Ok(Json(events))
}

/// `GET /events/:id`
pub async fn get_event(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppPath(event_id): AppPath<EventId>,
) -> WebResult<Json<EventFull>> {
    let event = state.events.public_event(event_id).await?;
    state.events.record_hit(event_uri(event_id), ip);
    Ok(Json(event))
}

/// `GET /compilations?pinned=&from=0&size=10`
pub async fn list_compilations(
    State(state): State<AppState>,
    pairs: QueryPairs,
    pagination: Pagination,
) -> WebResult<Json<Vec<CompilationDto>>> {
    let pinned = pairs.parse_value("pinned")?;
    let page = page(&state, pagination)?;
    Ok(Json(state.events.compilations(pinned, page).await?))
}

/// `GET /compilations/:comp_id`
pub async fn get_compilation(
    State(state): State<AppState>,
    AppPath(compilation_id): AppPath<CompilationId>,
) -> WebResult<Json<CompilationDto>> {
    Ok(Json(state.events.compilation(compilation_id).await?))
}
