//! Participant endpoints.
//!
//! - GET /users/:user_id/requests - Own requests
//! - POST /users/:user_id/requests?eventId= - Request to join a published event
//! - PATCH /users/:user_id/requests/:request_id/cancel - Withdraw a request

use crate::metrics;
use axum::{extract::State, http::StatusCode, Json};
use eventhub_core::store::EventHubStore;
use eventhub_core::types::{EventId, ParticipationRequest, RequestId, UserId};
use eventhub_web::{AppError, AppPath, QueryPairs, WebResult};
use std::sync::Arc;

/// `GET /users/:user_id/requests`
pub async fn list_requests(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(user_id): AppPath<UserId>,
) -> WebResult<Json<Vec<ParticipationRequest>>> {
    Ok(Json(store.requests_of(user_id).await?))
}

/// `POST /users/:user_id/requests?eventId=`
pub async fn submit_request(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath(user_id): AppPath<UserId>,
    pairs: QueryPairs,
) -> WebResult<(StatusCode, Json<ParticipationRequest>)> {
    let event_id = pairs
        .parse_value::<i64>("eventId")?
        .map(EventId::new)
        .ok_or_else(|| AppError::bad_request("eventId is required"))?;

    match store.submit_request(event_id, user_id).await {
        Ok(request) => {
            metrics::record_request_submitted(&request);
            tracing::info!(
                request_id = %request.id,
                event_id = %event_id,
                requester_id = %user_id,
                status = %request.status.as_str(),
                "Request submitted"
            );
            Ok((StatusCode::CREATED, Json(request)))
        },
        Err(e) => {
            metrics::record_admission_error(&e);
            tracing::warn!(event_id = %event_id, requester_id = %user_id, error = %e, "Request refused");
            Err(e.into())
        },
    }
}

/// `PATCH /users/:user_id/requests/:request_id/cancel`
pub async fn cancel_request(
    State(store): State<Arc<dyn EventHubStore>>,
    AppPath((user_id, request_id)): AppPath<(UserId, RequestId)>,
) -> WebResult<Json<ParticipationRequest>> {
    match store.cancel_request(request_id, user_id).await {
        Ok(request) => {
            metrics::record_request_canceled();
            tracing::info!(request_id = %request.id, requester_id = %user_id, "Request canceled");
            Ok(Json(request))
        },
        Err(e) => {
            metrics::record_admission_error(&e);
            Err(e.into())
        },
    }
}
