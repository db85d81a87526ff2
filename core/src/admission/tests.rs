//! Unit tests for `AdmissionReducer`.
//!
//! These cover the validation order of each command, spillover during bulk
//! confirmation and the capacity properties under arbitrary batches.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code

use super::*;
use crate::effect::Effect;
use crate::environment::Clock;
use crate::error::{ConflictReason, DomainError, Entity};
use crate::reducer::Reducer;
use crate::types::{
    CategoryId, Event, EventId, EventState, Location, ParticipationRequest, RequestId,
    RequestStatus, UserId,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::sync::Arc;

const OWNER: UserId = UserId::new(1);

struct StoppedClock(DateTime<Utc>);

impl Clock for StoppedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

fn env() -> AdmissionEnvironment {
    AdmissionEnvironment::new(Arc::new(StoppedClock(now())))
}

fn event(limit: u32, moderation: bool) -> Event {
    Event {
        id: EventId::new(10),
        title: "Rust meetup".to_string(),
        annotation: "An evening of talks about ownership".to_string(),
        description: "Three talks, pizza and a lot of borrow checking".to_string(),
        category_id: CategoryId::new(1),
        initiator_id: OWNER,
        location: Location { lat: 0.0, lon: 0.0 },
        paid: false,
        participant_limit: limit,
        request_moderation: moderation,
        event_date: now() + Duration::days(7),
        created_on: now() - Duration::days(1),
        published_on: Some(now()),
        state: EventState::Published,
        moderation_comment: None,
    }
}

fn request(id: i64, status: RequestStatus) -> ParticipationRequest {
    ParticipationRequest {
        id: RequestId::new(id),
        event_id: EventId::new(10),
        requester_id: UserId::new(100 + id),
        status,
        created: now(),
    }
}

fn pending(ids: impl IntoIterator<Item = i64>) -> Vec<ParticipationRequest> {
    ids.into_iter().map(|id| request(id, RequestStatus::Pending)).collect()
}

fn ids(raw: &[i64]) -> Vec<RequestId> {
    raw.iter().copied().map(RequestId::new).collect()
}

fn conflict(result: crate::Result<Vec<AdmissionAction>>) -> ConflictReason {
    match result {
        Err(DomainError::Conflict(reason)) => reason,
        other => panic!("expected conflict, got {other:?}"),
    }
}

// ============================================================================
// Submit
// ============================================================================

#[test]
fn test_submit_moderated_event_is_pending() {
    let mut state = AdmissionState::new(event(2, true), 0);

    let facts = AdmissionReducer::new()
        .execute(&mut state, AdmissionAction::SubmitRequest { requester_id: UserId::new(5) }, &env())
        .unwrap();

    assert_eq!(
        facts,
        vec![AdmissionAction::RequestSubmitted(SubmittedRequest {
            event_id: EventId::new(10),
            requester_id: UserId::new(5),
            status: RequestStatus::Pending,
            created: now(),
        })]
    );
    assert_eq!(state.confirmed, 0);
}

#[test]
fn test_submit_unlimited_event_is_confirmed() {
    let mut state = AdmissionState::new(event(0, true), 0);

    let facts = AdmissionReducer::new()
        .execute(&mut state, AdmissionAction::SubmitRequest { requester_id: UserId::new(5) }, &env())
        .unwrap();

    assert!(matches!(
        &facts[..],
        [AdmissionAction::RequestSubmitted(SubmittedRequest { status: RequestStatus::Confirmed, .. })]
    ));
    assert_eq!(state.confirmed, 1);
}

#[test]
fn test_submit_unmoderated_event_is_confirmed() {
    let mut state = AdmissionState::new(event(3, false), 1);

    AdmissionReducer::new()
        .execute(&mut state, AdmissionAction::SubmitRequest { requester_id: UserId::new(5) }, &env())
        .unwrap();

    assert_eq!(state.submitted[0].status, RequestStatus::Confirmed);
    assert_eq!(state.confirmed, 2);
}

#[test]
fn test_submit_unpublished_event_is_not_found() {
    let mut unpublished = event(2, true);
    unpublished.state = EventState::Pending;
    let mut state = AdmissionState::new(unpublished, 0);

    let result = AdmissionReducer::new().execute(
        &mut state,
        AdmissionAction::SubmitRequest { requester_id: UserId::new(5) },
        &env(),
    );

    assert_eq!(
        result,
        Err(DomainError::NotFound { entity: Entity::Event, id: 10 })
    );
}

#[test]
fn test_submit_own_event_conflicts() {
    let mut state = AdmissionState::new(event(2, true), 0);

    let reason = conflict(AdmissionReducer::new().execute(
        &mut state,
        AdmissionAction::SubmitRequest { requester_id: OWNER },
        &env(),
    ));

    assert_eq!(reason, ConflictReason::OwnRequest { event_id: EventId::new(10) });
}

#[test]
fn test_submit_full_event_conflicts_before_duplicate() {
    // Capacity is checked before uniqueness
    let mut state = AdmissionState::new(event(1, true), 1)
        .with_requests([request(1, RequestStatus::Confirmed)]);

    let reason = conflict(AdmissionReducer::new().execute(
        &mut state,
        AdmissionAction::SubmitRequest { requester_id: UserId::new(101) },
        &env(),
    ));

    assert_eq!(reason, ConflictReason::CapacityExceeded { event_id: EventId::new(10) });
}

#[test]
fn test_duplicate_submit_conflicts_whatever_the_status() {
    for status in [
        RequestStatus::Pending,
        RequestStatus::Confirmed,
        RequestStatus::Rejected,
        RequestStatus::Canceled,
    ] {
        let confirmed = u32::from(status == RequestStatus::Confirmed);
        let mut state = AdmissionState::new(event(5, true), confirmed)
            .with_requests([request(1, status)]);
        let before = state.requests.clone();

        let reason = conflict(AdmissionReducer::new().execute(
            &mut state,
            AdmissionAction::SubmitRequest { requester_id: UserId::new(101) },
            &env(),
        ));

        assert!(matches!(reason, ConflictReason::DuplicateRequest { .. }));
        assert_eq!(state.requests, before);
        assert!(state.submitted.is_empty());
    }
}

#[test]
fn test_rejected_command_produces_no_effects() {
    let mut state = AdmissionState::new(event(2, true), 0);

    let effects = AdmissionReducer::new().reduce(
        &mut state,
        AdmissionAction::SubmitRequest { requester_id: OWNER },
        &env(),
    );

    assert!(effects.is_empty());
    assert!(state.last_error.is_some());
}

// ============================================================================
// Cancel
// ============================================================================

#[test]
fn test_cancel_confirmed_frees_a_slot() {
    let mut state = AdmissionState::new(event(2, true), 2).with_requests([
        request(1, RequestStatus::Confirmed),
        request(2, RequestStatus::Confirmed),
    ]);

    let facts = AdmissionReducer::new()
        .execute(
            &mut state,
            AdmissionAction::CancelRequest {
                request_id: RequestId::new(1),
                requester_id: UserId::new(101),
            },
            &env(),
        )
        .unwrap();

    assert_eq!(
        facts,
        vec![AdmissionAction::RequestStatusChanged {
            request_id: RequestId::new(1),
            from: RequestStatus::Confirmed,
            to: RequestStatus::Canceled,
        }]
    );
    assert_eq!(state.confirmed, 1);
    assert_eq!(state.requests[&RequestId::new(2)].status, RequestStatus::Confirmed);
}

#[test]
fn test_cancel_by_someone_else_is_not_found() {
    let mut state =
        AdmissionState::new(event(2, true), 0).with_requests([request(1, RequestStatus::Pending)]);

    let result = AdmissionReducer::new().execute(
        &mut state,
        AdmissionAction::CancelRequest {
            request_id: RequestId::new(1),
            requester_id: UserId::new(999),
        },
        &env(),
    );

    assert_eq!(result, Err(DomainError::NotFound { entity: Entity::Request, id: 1 }));
}

#[test]
fn test_cancel_twice_is_a_no_op() {
    let mut state =
        AdmissionState::new(event(2, true), 0).with_requests([request(1, RequestStatus::Canceled)]);

    let facts = AdmissionReducer::new()
        .execute(
            &mut state,
            AdmissionAction::CancelRequest {
                request_id: RequestId::new(1),
                requester_id: UserId::new(101),
            },
            &env(),
        )
        .unwrap();

    assert!(facts.is_empty());
}

#[test]
fn test_cancel_rejected_keeps_confirmed_count() {
    let mut state = AdmissionState::new(event(2, true), 1).with_requests([
        request(1, RequestStatus::Rejected),
        request(2, RequestStatus::Confirmed),
    ]);

    let facts = AdmissionReducer::new()
        .execute(
            &mut state,
            AdmissionAction::CancelRequest {
                request_id: RequestId::new(1),
                requester_id: UserId::new(101),
            },
            &env(),
        )
        .unwrap();

    assert_eq!(
        facts,
        vec![AdmissionAction::RequestStatusChanged {
            request_id: RequestId::new(1),
            from: RequestStatus::Rejected,
            to: RequestStatus::Canceled,
        }]
    );
    assert_eq!(state.requests[&RequestId::new(1)].status, RequestStatus::Canceled);
    assert_eq!(state.confirmed, 1);
}

// ============================================================================
// Moderation
// ============================================================================

fn moderate(raw_ids: &[i64], status: RequestStatus) -> AdmissionAction {
    AdmissionAction::ModerateRequests {
        owner_id: OWNER,
        request_ids: ids(raw_ids),
        status,
    }
}

#[test]
fn test_bulk_confirm_spills_over_in_id_order() {
    let mut state = AdmissionState::new(event(2, true), 0).with_requests(pending([1, 2, 3]));

    // Order of the input ids does not matter
    let facts = AdmissionReducer::new()
        .execute(&mut state, moderate(&[3, 1, 2], RequestStatus::Confirmed), &env())
        .unwrap();

    let result = state.moderation_result();
    let confirmed: Vec<_> = result.confirmed_requests.iter().map(|r| r.id.get()).collect();
    let rejected: Vec<_> = result.rejected_requests.iter().map(|r| r.id.get()).collect();

    assert_eq!(confirmed, vec![1, 2]);
    assert_eq!(rejected, vec![3]);
    assert_eq!(state.confirmed, 2);
    assert_eq!(facts.len(), 3);
    assert!(facts.iter().all(AdmissionAction::is_fact));
    assert!(!moderate(&[1], RequestStatus::Confirmed).is_fact());
}

#[test]
fn test_bulk_reject_rejects_everything() {
    let mut state = AdmissionState::new(event(1, true), 1).with_requests(pending([4, 5]));

    AdmissionReducer::new()
        .execute(&mut state, moderate(&[4, 5], RequestStatus::Rejected), &env())
        .unwrap();

    let result = state.moderation_result();
    assert!(result.confirmed_requests.is_empty());
    assert_eq!(result.rejected_requests.len(), 2);
    assert_eq!(state.confirmed, 1);
}

#[test]
fn test_bulk_non_pending_member_aborts_batch() {
    let mut state = AdmissionState::new(event(5, true), 1).with_requests([
        request(1, RequestStatus::Pending),
        request(2, RequestStatus::Confirmed),
        request(3, RequestStatus::Pending),
    ]);
    let before = state.clone();

    let reason = conflict(AdmissionReducer::new().execute(
        &mut state,
        moderate(&[1, 2, 3], RequestStatus::Confirmed),
        &env(),
    ));

    assert_eq!(
        reason,
        ConflictReason::RequestNotPending {
            request_id: RequestId::new(2),
            status: RequestStatus::Confirmed,
        }
    );
    assert_eq!(state.requests, before.requests);
    assert_eq!(state.confirmed, before.confirmed);
}

#[test]
fn test_bulk_precondition_order() {
    let reducer = AdmissionReducer::new();

    // Not the owner
    let mut state = AdmissionState::new(event(0, false), 0).with_requests(pending([1]));
    let result = reducer.execute(
        &mut state,
        AdmissionAction::ModerateRequests {
            owner_id: UserId::new(77),
            request_ids: ids(&[1]),
            status: RequestStatus::Confirmed,
        },
        &env(),
    );
    assert_eq!(result, Err(DomainError::NotFound { entity: Entity::Event, id: 10 }));

    // Unlimited before unmoderated
    let mut state = AdmissionState::new(event(0, false), 0).with_requests(pending([1]));
    let reason = conflict(reducer.execute(&mut state, moderate(&[1], RequestStatus::Confirmed), &env()));
    assert_eq!(reason, ConflictReason::UnlimitedEvent { event_id: EventId::new(10) });

    // Unmoderated
    let mut state = AdmissionState::new(event(3, false), 0).with_requests(pending([1]));
    let reason = conflict(reducer.execute(&mut state, moderate(&[1], RequestStatus::Confirmed), &env()));
    assert_eq!(reason, ConflictReason::NotModerated { event_id: EventId::new(10) });

    // Full
    let mut state = AdmissionState::new(event(1, true), 1).with_requests(pending([1]));
    let reason = conflict(reducer.execute(&mut state, moderate(&[1], RequestStatus::Confirmed), &env()));
    assert_eq!(reason, ConflictReason::CapacityExceeded { event_id: EventId::new(10) });

    // A full event can still reject
    let mut state = AdmissionState::new(event(1, true), 1).with_requests(pending([1]));
    assert!(reducer.execute(&mut state, moderate(&[1], RequestStatus::Rejected), &env()).is_ok());
}

#[test]
fn test_bulk_input_validation() {
    let reducer = AdmissionReducer::new();
    let mut state = AdmissionState::new(event(3, true), 0).with_requests(pending([1]));

    let empty = reducer.execute(&mut state, moderate(&[], RequestStatus::Confirmed), &env());
    assert!(matches!(empty, Err(DomainError::Validation(_))));

    let pending_target = reducer.execute(&mut state, moderate(&[1], RequestStatus::Pending), &env());
    assert!(matches!(pending_target, Err(DomainError::Validation(_))));
}

#[test]
fn test_bulk_drops_foreign_ids() {
    let mut foreign = request(9, RequestStatus::Pending);
    foreign.event_id = EventId::new(99);
    let mut state = AdmissionState::new(event(3, true), 0)
        .with_requests(pending([1]))
        .with_requests([foreign]);

    let effects = AdmissionReducer::new().reduce(
        &mut state,
        moderate(&[1, 9, 42], RequestStatus::Confirmed),
        &env(),
    );

    let facts: Vec<_> = effects.into_iter().flat_map(Effect::into_persisted).collect();
    assert_eq!(facts.len(), 1);
    assert_eq!(state.requests[&RequestId::new(9)].status, RequestStatus::Pending);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_bulk_confirm_takes_first_k(limit in 1u32..10, confirmed in 0u32..10, n in 1i64..15) {
        prop_assume!(confirmed < limit);
        let mut state = AdmissionState::new(event(limit, true), confirmed)
            .with_requests(pending(1..=n));

        AdmissionReducer::new()
            .execute(&mut state, moderate(&(1..=n).collect::<Vec<_>>(), RequestStatus::Confirmed), &env())
            .unwrap();

        let k = usize::try_from(limit - confirmed).unwrap();
        let n = usize::try_from(n).unwrap();
        let result = state.moderation_result();
        prop_assert_eq!(result.confirmed_requests.len(), k.min(n));
        prop_assert_eq!(result.rejected_requests.len(), n - k.min(n));
        prop_assert!(result
            .confirmed_requests
            .iter()
            .zip(result.confirmed_requests.iter().skip(1))
            .all(|(a, b)| a.id < b.id));
        if let (Some(last_confirmed), Some(first_rejected)) =
            (result.confirmed_requests.last(), result.rejected_requests.first())
        {
            prop_assert!(last_confirmed.id < first_rejected.id);
        }
        prop_assert!(state.confirmed <= limit);
    }

    #[test]
    fn prop_submissions_never_overcommit(limit in 1u32..8, moderation: bool, attempts in 1i64..20) {
        let mut state = AdmissionState::new(event(limit, moderation), 0);
        let reducer = AdmissionReducer::new();

        for requester in 0..attempts {
            let _ = reducer.execute(
                &mut state,
                AdmissionAction::SubmitRequest { requester_id: UserId::new(1000 + requester) },
                &env(),
            );
            prop_assert!(state.confirmed <= limit);
        }
    }
}
