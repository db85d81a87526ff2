//! Event owner endpoints.
//!
//! - POST /users/:user_id/events - Create an event
//! - GET /users/:user_id/events - List own events
//! - GET /users/:user_id/events/:event_id - Get an own event
//! - PATCH /users/:user_id/events/:event_id - Edit, withdraw or resubmit an own event
//! - GET /users/:user_id/events/:event_id/requests - Requests for an own event
//! - PATCH /users/:user_id/events/:event_id/requests - Confirm or reject requests in bulk

use super::page;
use crate::dto::{EventFull, EventShort};
use crate::metrics;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use eventhub_core::admission::ModerationResult;
use eventhub_core::publication::{Actor, EventUpdate};
use eventhub_core::store::{EventHubStore, StatusDecision};
use eventhub_core::types::{EventId, NewEvent, ParticipationRequest, UserId};
use eventhub_web::{AppJson, AppPath, Pagination, WebResult};
use std::sync::Arc;

/// `POST /users/:user_id/events`
pub async fn create_event(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<UserId>,
    AppJson(input): AppJson<NewEvent>,
) -> WebResult<(StatusCode, Json<EventFull>)> {
    let event = state.store.create_event(user_id, input).await?;
    tracing::info!(event_id = %event.id, initiator_id = %user_id, "Event created");
    Ok((StatusCode::CREATED, Json(state.events.single(event, false).await?)))
}

/// `GET /users/:user_id/events?from=0&size=10`
pub async fn list_events(
    State(state): State<AppState>,
    AppPath(user_id): AppPath<UserId>,
    pagination: Pagination,
) -> WebResult<Json<Vec<EventShort>>> {
    let page = page(&state, pagination)?;
    Ok(Json(state.events.owner_events(user_id, page).await?))
}

/// `GET /users/:user_id/events/:event_id`
pub async fn get_event(
    State(state): State<AppState>,
    AppPath((user_id, event_id)): AppPath<(UserId, EventId)>,
) -> WebResult<Json<EventFull>> {
    Ok(Json(state.events.owner_event(user_id, event_id).await?))
}

/// `PATCH /users/:user_id/events/:event_id`
pub async fn update_event(
    State(state): State<AppState>,
    AppPath((user_id, event_id)): AppPath<(UserId, EventId)>,
    AppJson(update): AppJson<EventUpdate>,
) -> WebResult<Json<EventFull>> {
    let event = state
        .store
        .update_event(event_id, Actor::Owner(user_id), update)
        .await?;
    tracing::info!(event_id = %event.id, state = %event.state.as_str(), "Event updated by owner");
    Ok(Json(state.events.single(event, false).await?))
}

/// `GET /users/:user_id/events/:event_id/requests`
pub async fn list_requests(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath((user_id, event_id)): AppPath<(UserId, EventId)>,
) -> WebResult<Json<Vec<ParticipationRequest>>> {
    Ok(Json(store.requests_for_event(event_id, user_id).await?))
}

/// `PATCH /users/:user_id/events/:event_id/requests`
pub async fn moderate_requests(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath((user_id, event_id)): AppPath<(UserId, EventId)>,
    AppJson(decision): AppJson<StatusDecision>,
) -> WebResult<Json<ModerationResult>> {
    let target = decision.status;
    let result = store.moderate_requests(event_id, user_id, decision).await;
    match &result {
        Ok(outcome) => {
            metrics::record_moderation(outcome);
            tracing::info!(
                event_id = %event_id,
                target = %target.as_str(),
                confirmed = outcome.confirmed_requests.len(),
                rejected = outcome.rejected_requests.len(),
                "Requests moderated"
            );
        },
        Err(e) => {
            metrics::record_admission_error(e);
            tracing::warn!(event_id = %event_id, error = %e, "Moderation refused");
        },
    }
    Ok(Json(result?))
}
