//! HTTP tests for the event hub over in-memory backends.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code

use axum::http::StatusCode;
use axum_test::{TestResponse, TestServer};
use chrono::Duration;
use eventhub_core::admission::ModerationResult;
use eventhub_core::environment::Clock;
use eventhub_core::store::EventHubStore;
use eventhub_core::types::{
    timestamp, Category, EventId, EventState, ParticipationRequest, RequestStatus, User, UserId,
};
use eventhub_server::dto::{CompilationDto, EventFull, EventShort};
use eventhub_server::{build_router, AppState, Settings};
use eventhub_testing::{fixtures, test_clock, InMemoryStore, InMemoryViewStats};
use eventhub_web::error::ErrorBody;
use serde_json::json;
use std::sync::Arc;

struct Harness {
    server: TestServer,
    store: Arc<InMemoryStore>,
    views: Arc<InMemoryViewStats>,
}

fn harness_with(views: InMemoryViewStats) -> Harness {
    let clock = Arc::new(test_clock());
    let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
    let views = Arc::new(views);
    let state = AppState::new(store.clone(), views.clone(), clock, Settings::default());
    let server = TestServer::new(build_router(state)).unwrap();
    Harness { server, store, views }
}

fn harness() -> Harness {
    harness_with(InMemoryViewStats::new())
}

impl Harness {
    fn store(&self) -> &dyn EventHubStore {
        self.store.as_ref()
    }

    async fn publish(&self, event_id: EventId) -> TestResponse {
        self.server
            .patch(&format!("/admin/events/{event_id}"))
            .json(&json!({"stateAction": "PUBLISH_EVENT"}))
            .await
    }

    async fn submit(&self, user_id: UserId, event_id: EventId) -> TestResponse {
        self.server
            .post(&format!("/users/{user_id}/requests"))
            .add_query_param("eventId", event_id)
            .await
    }

    /// Waits for the fire-and-forget hit tasks
    async fn wait_for_hits(&self, count: usize) {
        for _ in 0..100 {
            if self.views.recorded().await.len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {count} recorded hits");
    }
}

fn error_code(response: &TestResponse) -> String {
    response.json::<ErrorBody>().code
}

#[tokio::test]
async fn test_bulk_confirm_spills_over_capacity() {
    let h = harness();
    let world = fixtures::seed_with(h.store(), 2, true).await;
    h.publish(world.event.id).await.assert_status_ok();

    let mut ids = Vec::new();
    for user in fixtures::participants(h.store(), 3).await {
        let response = h.submit(user.id, world.event.id).await;
        response.assert_status(StatusCode::CREATED);
        let request: ParticipationRequest = response.json();
        assert_eq!(request.status, RequestStatus::Pending);
        ids.push(request.id);
    }

    let response = h
        .server
        .patch(&format!("/users/{}/events/{}/requests", world.owner.id, world.event.id))
        .json(&json!({"requestIds": ids, "status": "CONFIRMED"}))
        .await;
    response.assert_status_ok();
    let result: ModerationResult = response.json();
    assert_eq!(
        result.confirmed_requests.iter().map(|r| r.id).collect::<Vec<_>>(),
        ids[..2].to_vec()
    );
    assert_eq!(result.rejected_requests.len(), 1);
    assert_eq!(result.rejected_requests[0].id, ids[2]);

    let event: EventFull = h
        .server
        .get(&format!("/users/{}/events/{}", world.owner.id, world.event.id))
        .await
        .json();
    assert_eq!(event.confirmed_requests, 2);
    assert_eq!(event.views, None);

    let late = h.store().create_user(fixtures::new_user("late")).await.unwrap();
    let full = h.submit(late.id, world.event.id).await;
    full.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&full), "capacity_exceeded");
}

#[tokio::test]
async fn test_unlimited_event_confirms_immediately() {
    let h = harness();
    let world = fixtures::seed_with(h.store(), 0, true).await;
    h.publish(world.event.id).await.assert_status_ok();
    let ann = h.store().create_user(fixtures::new_user("ann")).await.unwrap();

    let response = h.submit(ann.id, world.event.id).await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<ParticipationRequest>().status, RequestStatus::Confirmed);
}

#[tokio::test]
async fn test_moderating_unmoderated_event_conflicts() {
    let h = harness();
    let world = fixtures::seed_with(h.store(), 2, false).await;
    h.publish(world.event.id).await.assert_status_ok();
    let ann = h.store().create_user(fixtures::new_user("ann")).await.unwrap();
    let request: ParticipationRequest = h.submit(ann.id, world.event.id).await.json();
    assert_eq!(request.status, RequestStatus::Confirmed);

    let response = h
        .server
        .patch(&format!("/users/{}/events/{}/requests", world.owner.id, world.event.id))
        .json(&json!({"requestIds": [request.id], "status": "CONFIRMED"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "not_moderated");
}

#[tokio::test]
async fn test_publishing_twice_conflicts() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;

    let first = h.publish(world.event.id).await;
    first.assert_status_ok();
    let published: EventFull = first.json();
    assert_eq!(published.state, EventState::Published);
    assert_eq!(published.published_on, Some(test_clock().now()));
    assert_eq!(published.initiator.id, world.owner.id);
    assert_eq!(published.category, world.category);

    let second = h.publish(world.event.id).await;
    second.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&second), "illegal_transition");
}

#[tokio::test]
async fn test_duplicate_request_leaves_original_untouched() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();
    let ann = h.store().create_user(fixtures::new_user("ann")).await.unwrap();

    let original: ParticipationRequest = h.submit(ann.id, world.event.id).await.json();
    let duplicate = h.submit(ann.id, world.event.id).await;
    duplicate.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&duplicate), "duplicate_request");

    let mine: Vec<ParticipationRequest> = h
        .server
        .get(&format!("/users/{}/requests", ann.id))
        .await
        .json();
    assert_eq!(mine, vec![original]);
}

#[tokio::test]
async fn test_request_preconditions() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    let ann = h.store().create_user(fixtures::new_user("ann")).await.unwrap();

    h.submit(ann.id, world.event.id)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    h.publish(world.event.id).await.assert_status_ok();
    let own = h.submit(world.owner.id, world.event.id).await;
    own.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&own), "own_request");

    h.server
        .post(&format!("/users/{}/requests", ann.id))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancel_only_by_requester() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();
    let users = fixtures::participants(h.store(), 2).await;
    let request: ParticipationRequest = h.submit(users[0].id, world.event.id).await.json();

    h.server
        .patch(&format!("/users/{}/requests/{}/cancel", users[1].id, request.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let canceled = h
        .server
        .patch(&format!("/users/{}/requests/{}/cancel", users[0].id, request.id))
        .await;
    canceled.assert_status_ok();
    assert_eq!(canceled.json::<ParticipationRequest>().status, RequestStatus::Canceled);

    let for_owner: Vec<ParticipationRequest> = h
        .server
        .get(&format!("/users/{}/events/{}/requests", world.owner.id, world.event.id))
        .await
        .json();
    assert_eq!(for_owner[0].status, RequestStatus::Canceled);

    h.server
        .get(&format!("/users/{}/events/{}/requests", users[1].id, world.event.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_update_validation() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    let url = format!("/users/{}/events/{}/requests", world.owner.id, world.event.id);

    let empty = h
        .server
        .patch(&url)
        .json(&json!({"requestIds": [], "status": "CONFIRMED"}))
        .await;
    empty.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&empty), "validation");

    h.server
        .patch(&url)
        .json(&json!({"requestIds": [1], "status": "CANCELED"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    h.server
        .patch(&url)
        .json(&json!({"requestIds": [1], "status": "MAYBE"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_owner_authoring_flow() {
    let h = harness();
    let owner = h.store().create_user(fixtures::new_user("owner")).await.unwrap();
    let category = h.store().create_category("talks".to_string()).await.unwrap();
    let event_date = timestamp::format(&(test_clock().now() + Duration::days(3)));

    let created = h
        .server
        .post(&format!("/users/{}/events", owner.id))
        .json(&json!({
            "title": "Rust meetup",
            "annotation": "An evening of talks about ownership",
            "description": "Three talks, pizza and a lot of borrow checking",
            "category": category.id,
            "location": {"lat": 55.75, "lon": 37.62},
            "eventDate": event_date,
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let event: EventFull = created.json();
    assert_eq!(event.state, EventState::Pending);
    assert_eq!(event.participant_limit, 0);
    assert!(event.request_moderation);
    assert!(!event.paid);

    let too_soon = timestamp::format(&(test_clock().now() + Duration::hours(1)));
    h.server
        .patch(&format!("/users/{}/events/{}", owner.id, event.id))
        .json(&json!({"eventDate": too_soon}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let withdrawn: EventFull = h
        .server
        .patch(&format!("/users/{}/events/{}", owner.id, event.id))
        .json(&json!({"stateAction": "CANCEL_REVIEW", "title": "Rust meetup, spring"}))
        .await
        .json();
    assert_eq!(withdrawn.state, EventState::Canceled);
    assert_eq!(withdrawn.title, "Rust meetup, spring");

    let mine: Vec<EventShort> = h
        .server
        .get(&format!("/users/{}/events", owner.id))
        .await
        .json();
    assert_eq!(mine.len(), 1);

    let stranger = h.store().create_user(fixtures::new_user("stranger")).await.unwrap();
    h.server
        .get(&format!("/users/{}/events/{}", stranger.id, event.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_owner_cannot_edit_published_event() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();

    let response = h
        .server
        .patch(&format!("/users/{}/events/{}", world.owner.id, world.event.id))
        .json(&json!({"title": "Renamed"}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "published_event_locked");
}

#[tokio::test]
async fn test_public_reads_record_hits_and_report_views() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;

    h.server
        .get(&format!("/events/{}", world.event.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    h.publish(world.event.id).await.assert_status_ok();
    h.server
        .get(&format!("/events/{}", world.event.id))
        .await
        .assert_status_ok();
    h.wait_for_hits(1).await;

    let event: EventFull = h
        .server
        .get(&format!("/events/{}", world.event.id))
        .await
        .json();
    assert_eq!(event.views, Some(1));

    let listed: Vec<EventShort> = h
        .server
        .get("/events")
        .add_query_param("text", "OWNERSHIP")
        .add_query_param("sort", "VIEWS")
        .await
        .json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, world.event.id);
    assert_eq!(listed[0].views, Some(1));

    h.wait_for_hits(3).await;
    let hits = h.views.recorded().await;
    assert_eq!(hits[0].uri, format!("/events/{}", world.event.id));
    assert_eq!(hits[0].ip, "127.0.0.1");
    assert!(hits.iter().any(|hit| hit.uri == "/events"));
}

#[tokio::test]
async fn test_rejected_search_records_no_hit() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();

    h.server
        .get("/events")
        .add_query_param("rangeStart", "2025-03-01 00:00:00")
        .add_query_param("rangeEnd", "2025-02-01 00:00:00")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server.get("/events").await.assert_status_ok();
    h.server
        .get(&format!("/events/{}", world.event.id))
        .await
        .assert_status_ok();
    h.wait_for_hits(2).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut uris: Vec<String> = h.views.recorded().await.into_iter().map(|hit| hit.uri).collect();
    uris.sort();
    assert_eq!(uris, vec!["/events".to_string(), format!("/events/{}", world.event.id)]);
}

#[tokio::test]
async fn test_public_search_filters() {
    let h = harness();
    let world = fixtures::seed_with(h.store(), 1, false).await;
    h.publish(world.event.id).await.assert_status_ok();

    let search = |only_available: bool| {
        h.server
            .get("/events")
            .add_query_param("categories", world.category.id)
            .add_query_param("paid", false)
            .add_query_param("onlyAvailable", only_available)
            .add_query_param("sort", "EVENT_DATE")
    };

    assert_eq!(search(true).await.json::<Vec<EventShort>>().len(), 1);
    let ann = h.store().create_user(fixtures::new_user("ann")).await.unwrap();
    h.submit(ann.id, world.event.id).await.assert_status(StatusCode::CREATED);
    assert!(search(true).await.json::<Vec<EventShort>>().is_empty());

    let all: Vec<EventShort> = search(false).await.json();
    assert_eq!(all[0].confirmed_requests, 1);

    h.server
        .get("/events")
        .add_query_param("sort", "POPULARITY")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    h.server
        .get("/events")
        .add_query_param("rangeStart", "2025-01-01T00:00:00")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_views_degrade_when_stats_unavailable() {
    let h = harness_with(InMemoryViewStats::unavailable());
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();

    let response = h.server.get(&format!("/events/{}", world.event.id)).await;
    response.assert_status_ok();
    assert_eq!(response.json::<EventFull>().views, Some(0));
}

#[tokio::test]
async fn test_admin_search_and_reject() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;

    let pending: Vec<EventFull> = h
        .server
        .get("/admin/events")
        .add_query_param("users", world.owner.id)
        .add_query_param("states", "PENDING,PUBLISHED")
        .await
        .json();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].confirmed_requests, 0);

    let rejected: EventFull = h
        .server
        .patch(&format!("/admin/events/{}", world.event.id))
        .json(&json!({"stateAction": "REJECT_EVENT", "moderationComment": "Needs a venue"}))
        .await
        .json();
    assert_eq!(rejected.state, EventState::Canceled);
    assert_eq!(rejected.moderation_comment.as_deref(), Some("Needs a venue"));

    let published: Vec<EventFull> = h
        .server
        .get("/admin/events")
        .add_query_param("states", "PUBLISHED")
        .await
        .json();
    assert!(published.is_empty());

    h.server
        .get("/admin/events")
        .add_query_param("states", "ARCHIVED")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_directory() {
    let h = harness();

    let created = h
        .server
        .post("/admin/users")
        .json(&json!({"name": "Ann", "email": "ann@example.com"}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let ann: User = created.json();

    let duplicate = h
        .server
        .post("/admin/users")
        .json(&json!({"name": "Ann Again", "email": "ann@example.com"}))
        .await;
    duplicate.assert_status(StatusCode::CONFLICT);

    let listed: Vec<User> = h
        .server
        .get("/admin/users")
        .add_query_param("ids", ann.id)
        .await
        .json();
    assert_eq!(listed, vec![ann.clone()]);

    let category: Category = h
        .server
        .post("/admin/categories")
        .json(&json!({"name": "concerts"}))
        .await
        .json();
    let renamed: Category = h
        .server
        .patch(&format!("/admin/categories/{}", category.id))
        .json(&json!({"name": "gigs"}))
        .await
        .json();
    assert_eq!(renamed.name, "gigs");

    let public: Category = h
        .server
        .get(&format!("/categories/{}", category.id))
        .await
        .json();
    assert_eq!(public, renamed);

    h.server
        .delete(&format!("/admin/categories/{}", category.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .delete(&format!("/admin/users/{}", ann.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    h.server
        .delete(&format!("/admin/users/{}", ann.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_compilation_lifecycle() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;
    h.publish(world.event.id).await.assert_status_ok();

    let created = h
        .server
        .post("/admin/compilations")
        .json(&json!({"title": "Weekend", "pinned": true, "events": [world.event.id]}))
        .await;
    created.assert_status(StatusCode::CREATED);
    let weekend: CompilationDto = created.json();
    assert_eq!(weekend.events.len(), 1);
    assert_eq!(weekend.events[0].id, world.event.id);
    assert_eq!(weekend.events[0].category, world.category);
    assert_eq!(weekend.events[0].views, None);

    let taken = h
        .server
        .post("/admin/compilations")
        .json(&json!({"title": "Weekend"}))
        .await;
    taken.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&taken), "duplicate_name");

    h.server
        .post("/admin/compilations")
        .json(&json!({"title": "Ghosts", "events": [999]}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    h.server
        .post("/admin/compilations")
        .json(&json!({"title": "   "}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let later: CompilationDto = h
        .server
        .post("/admin/compilations")
        .json(&json!({"title": "Later"}))
        .await
        .json();
    assert!(!later.pinned);
    assert!(later.events.is_empty());

    let pinned: Vec<CompilationDto> = h
        .server
        .get("/compilations")
        .add_query_param("pinned", true)
        .await
        .json();
    assert_eq!(pinned.len(), 1);
    assert_eq!(pinned[0].id, weekend.id);
    assert_eq!(pinned[0].events[0].views, Some(0));

    let patched: CompilationDto = h
        .server
        .patch(&format!("/admin/compilations/{}", later.id))
        .json(&json!({"events": [world.event.id, world.event.id]}))
        .await
        .json();
    assert_eq!(patched.title, "Later");
    assert_eq!(patched.events.len(), 1);

    let fetched: CompilationDto = h
        .server
        .get(&format!("/compilations/{}", later.id))
        .await
        .json();
    assert_eq!(fetched.events[0].id, world.event.id);
    let all: Vec<CompilationDto> = h.server.get("/compilations").await.json();
    assert_eq!(all.len(), 2);

    h.server
        .delete(&format!("/admin/compilations/{}", later.id))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let gone = h.server.get(&format!("/compilations/{}", later.id)).await;
    gone.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(error_code(&gone), "not_found");
    h.server
        .delete(&format!("/admin/compilations/{}", later.id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_category_in_use_conflicts() {
    let h = harness();
    let world = fixtures::seed(h.store()).await;

    let response = h
        .server
        .delete(&format!("/admin/categories/{}", world.category.id))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(error_code(&response), "category_in_use");
}

#[tokio::test]
async fn test_malformed_input_is_bad_request() {
    let h = harness();

    let path = h.server.get("/users/abc/events").await;
    path.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&path), "bad_request");

    h.server
        .get("/categories")
        .add_query_param("size", 0)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    h.server
        .post("/admin/categories")
        .json(&json!({"title": "missing name"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_disabled_metrics() {
    let h = harness();
    h.server.get("/health").await.assert_status_ok();
    h.server
        .get("/metrics")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
