//! Administrator endpoints.
//!
//! - POST /admin/users - Create a user
//! - GET /admin/users?ids= - List users, optionally by id
//! - DELETE /admin/users/:user_id - Delete a user and everything they own
//! - POST /admin/categories - Create a category
//! - PATCH /admin/categories/:cat_id - Rename a category
//! - DELETE /admin/categories/:cat_id - Delete an unused category
//! - GET /admin/events - Search events in any state
//! - PATCH /admin/events/:event_id - Edit, publish or reject an event
//! - POST /admin/compilations - Create a compilation
//! - PATCH /admin/compilations/:comp_id - Edit a compilation
//! - DELETE /admin/compilations/:comp_id - Delete a compilation

use super::page;
use crate::dto::{CompilationDto, EventFull};
use crate::metrics;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use eventhub_core::publication::{Actor, EventUpdate};
use eventhub_core::store::{EventFilter, EventHubStore};
use eventhub_core::types::{
    Category, CategoryId, CompilationId, CompilationPatch, EventId, EventState, NewCompilation,
    NewUser, StateAction, User, UserId,
};
use eventhub_web::{AppJson, AppPath, Pagination, QueryPairs, WebResult};
use serde::Deserialize;
use std::sync::Arc;

/// Body of category create and rename
#[derive(Debug, Deserialize)]
pub struct CategoryBody {
    /// Category name
    pub name: String,
}

/// `POST /admin/users`
pub async fn create_user(
    State(store): State<Arc<dyn EventHubStore>>,
    AppJson(user): AppJson<NewUser>,
) -> WebResult<(StatusCode, Json<User>)> {
    let user = store.create_user(user).await?;
    tracing::info!(user_id = %user.id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /admin/users?ids=1,2&from=0&size=10`
pub async fn list_users(
    State(state): State<AppState>,
    pairs: QueryPairs,
    pagination: Pagination,
) -> WebResult<Json<Vec<User>>> {
    let ids = pairs.list_with("ids", |raw| raw.parse::<i64>().map(UserId::new))?;
    let page = page(&state, pagination)?;
    Ok(Json(state.store.list_users(ids, page).await?))
}

/// `DELETE /admin/users/:user_id`
pub async fn delete_user(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(user_id): AppPath<UserId>,
) -> WebResult<StatusCode> {
    store.delete_user(user_id).await?;
    tracing::info!(user_id = %user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /admin/categories`
pub async fn create_category(
    State(store): State<Arc<dyn EventHubStore>>,
    AppJson(body): AppJson<CategoryBody>,
) -> WebResult<(StatusCode, Json<Category>)> {
    let category = store.create_category(body.name).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "Category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// `PATCH /admin/categories/:cat_id`
pub async fn rename_category(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(category_id): AppPath<CategoryId>,
    AppJson(body): AppJson<CategoryBody>,
) -> WebResult<Json<Category>> {
    let category = store.rename_category(category_id, body.name).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "Category renamed");
    Ok(Json(category))
}

/// `DELETE /admin/categories/:cat_id`
pub async fn delete_category(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(category_id): AppPath<CategoryId>,
) -> WebResult<StatusCode> {
    store.delete_category(category_id).await?;
    tracing::info!(category_id = %category_id, "Category deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/events?users=&states=&categories=&rangeStart=&rangeEnd=&from=&size=`
pub async fn search_events(
    State(state): State<AppState>,
    pairs: QueryPairs,
    pagination: Pagination,
) -> WebResult<Json<Vec<EventFull>>> {
    let filter = EventFilter {
        initiators: pairs.list_with("users", |raw| raw.parse::<i64>().map(UserId::new))?,
        states: pairs.list_with("states", EventState::parse)?,
        categories: pairs.list_with("categories", |raw| raw.parse::<i64>().map(CategoryId::new))?,
        range_start: pairs.timestamp("rangeStart")?,
        range_end: pairs.timestamp("rangeEnd")?,
        ..EventFilter::default()
    };
    let page = page(&state, pagination)?;
    Ok(Json(state.events.admin_search(filter, page).await?))
}

/// `PATCH /admin/events/:event_id`
pub async fn update_event(
    State(state): State<AppState>,
    AppPath(event_id): AppPath<EventId>,
    AppJson(update): AppJson<EventUpdate>,
) -> WebResult<Json<EventFull>> {
    let action = update.state_action;
    let event = state.store.update_event(event_id, Actor::Admin, update).await?;
    if action == Some(StateAction::PublishEvent) {
        metrics::record_event_published();
    }
    tracing::info!(event_id = %event.id, state = %event.state.as_str(), "Event updated by administrator");
    Ok(Json(state.events.single(event, false).await?))
}

/// `POST /admin/compilations`
pub async fn create_compilation(
    State(state): State<AppState>,
    AppJson(input): AppJson<NewCompilation>,
) -> WebResult<(StatusCode, Json<CompilationDto>)> {
    let compilation = state.store.create_compilation(input).await?;
    tracing::info!(compilation_id = %compilation.id, title = %compilation.title, "Compilation created");
    let dto = state.events.present_one(compilation, false).await?;
    Ok((StatusCode::CREATED, Json(dto)))
}

/// `PATCH /admin/compilations/:comp_id`
pub async fn update_compilation(
    State(state): State<AppState>,
    AppPath(compilation_id): AppPath<CompilationId>,
    AppJson(patch): AppJson<CompilationPatch>,
) -> WebResult<Json<CompilationDto>> {
    let compilation = state.store.update_compilation(compilation_id, patch).await?;
    tracing::info!(compilation_id = %compilation_id, "Compilation updated");
    Ok(Json(state.events.present_one(compilation, false).await?))
}

/// `DELETE /admin/compilations/:comp_id`
pub async fn delete_compilation(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(compilation_id): AppPath<CompilationId>,
) -> WebResult<StatusCode> {
    store.delete_compilation(compilation_id).await?;
    tracing::info!(compilation_id = %compilation_id, "Compilation deleted");
    Ok(StatusCode::NO_CONTENT)
}
