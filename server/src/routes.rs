//! Router configuration for the event hub.

use crate::api::{admin, owner, public, requests};
use crate::metrics;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};
use eventhub_web::{correlation_id, handlers::health_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
pub fn build_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/users", post(admin::create_user).get(admin::list_users))
        .route("/users/:user_id", delete(admin::delete_user))
        .route("/categories", post(admin::create_category))
        .route(
            "/categories/:cat_id",
            patch(admin::rename_category).delete(admin::delete_category),
        )
        .route("/events", get(admin::search_events))
        .route("/events/:event_id", patch(admin::update_event))
        .route("/compilations", post(admin::create_compilation))
        .route(
            "/compilations/:comp_id",
            patch(admin::update_compilation).delete(admin::delete_compilation),
        );

    let user_routes = Router::new()
        .route("/events", post(owner::create_event).get(owner::list_events))
        .route(
            "/events/:event_id",
            get(owner::get_event).patch(owner::update_event),
        )
        .route(
            "/events/:event_id/requests",
            get(owner::list_requests).patch(owner::moderate_requests),
        )
        .route(
            "/requests",
            get(requests::list_requests).post(requests::submit_request),
        )
        .route("/requests/:request_id/cancel", patch(requests::cancel_request));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::render))
        .route("/categories", get(public::list_categories))
        .route("/categories/:cat_id", get(public::get_category))
        .route("/events", get(public::search_events))
        .route("/events/:id", get(public::get_event))
        .route("/compilations", get(public::list_compilations))
        .route("/compilations/:comp_id", get(public::get_compilation))
        .nest("/admin", admin_routes)
        .nest("/users/:user_id", user_routes)
        .layer(middleware::from_fn(correlation_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
