//! Admission reducer.
//!
//! Validation order for each command is significant: the first failing check
//! determines the error the caller sees.

use super::actions::{AdmissionAction, SubmittedRequest};
use super::environment::AdmissionEnvironment;
use super::state::AdmissionState;
use crate::effect::Effect;
use crate::error::{ConflictReason, DomainError, Entity, Result};
use crate::reducer::Reducer;
use crate::types::{RequestId, RequestStatus, UserId};
use smallvec::{smallvec, SmallVec};
use std::collections::BTreeSet;

/// Reducer for request admission
#[derive(Clone, Debug, Default)]
pub struct AdmissionReducer;

impl AdmissionReducer {
    /// Creates a new `AdmissionReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs one command and returns the facts to persist, in order.
    ///
    /// # Errors
    ///
    /// Returns the [`DomainError`] the command was refused with. The state is
    /// left unchanged in that case.
    pub fn execute(
        &self,
        state: &mut AdmissionState,
        action: AdmissionAction,
        env: &AdmissionEnvironment,
    ) -> Result<Vec<AdmissionAction>> {
        state.last_error = None;
        let effects = self.reduce(state, action, env);
        if let Some(error) = state.last_error.take() {
            return Err(error);
        }
        Ok(effects
            .into_iter()
            .flat_map(Effect::into_persisted)
            .collect())
    }

    /// Validates `SubmitRequest`
    fn validate_submit(state: &AdmissionState, requester_id: UserId) -> Result<()> {
        let event = &state.event;

        // Unpublished events are invisible to participants
        if !event.is_published() {
            return Err(DomainError::not_found(Entity::Event, event.id));
        }

        if event.is_owned_by(requester_id) {
            return Err(ConflictReason::OwnRequest { event_id: event.id }.into());
        }

        if !event.limit().has_room(state.confirmed) {
            return Err(ConflictReason::CapacityExceeded { event_id: event.id }.into());
        }

        if state.has_request_from(requester_id) {
            return Err(ConflictReason::DuplicateRequest {
                event_id: event.id,
                requester_id,
            }
            .into());
        }

        Ok(())
    }

    /// Validates `CancelRequest`, returning `false` for an idempotent no-op
    fn validate_cancel(
        state: &AdmissionState,
        request_id: RequestId,
        requester_id: UserId,
    ) -> Result<bool> {
        let Some(request) = state
            .requests
            .get(&request_id)
            .filter(|r| r.requester_id == requester_id)
        else {
            return Err(DomainError::not_found(Entity::Request, request_id));
        };

        Ok(request.status != RequestStatus::Canceled)
    }

    /// Validates `ModerateRequests` and returns the selected ids in ascending order
    fn validate_moderation(
        state: &AdmissionState,
        owner_id: UserId,
        request_ids: &[RequestId],
        status: RequestStatus,
    ) -> Result<Vec<RequestId>> {
        let event = &state.event;

        if request_ids.is_empty() {
            return Err(DomainError::validation("request ids must not be empty"));
        }

        if !status.is_moderation_target() {
            return Err(DomainError::validation(format!(
                "status must be CONFIRMED or REJECTED, got {status}"
            )));
        }

        if !event.is_owned_by(owner_id) {
            return Err(DomainError::not_found(Entity::Event, event.id));
        }

        if event.limit().is_unlimited() {
            return Err(ConflictReason::UnlimitedEvent { event_id: event.id }.into());
        }

        if !event.request_moderation {
            return Err(ConflictReason::NotModerated { event_id: event.id }.into());
        }

        if status == RequestStatus::Confirmed && !event.limit().has_room(state.confirmed) {
            return Err(ConflictReason::CapacityExceeded { event_id: event.id }.into());
        }

        // Foreign ids are dropped; BTreeSet gives ascending, de-duplicated order
        let selected: BTreeSet<RequestId> = request_ids
            .iter()
            .copied()
            .filter(|id| {
                state
                    .requests
                    .get(id)
                    .is_some_and(|r| r.event_id == event.id)
            })
            .collect();

        // A single non-pending member aborts the whole batch
        if let Some(request) = selected
            .iter()
            .filter_map(|id| state.requests.get(id))
            .find(|r| r.status != RequestStatus::Pending)
        {
            return Err(ConflictReason::RequestNotPending {
                request_id: request.id,
                status: request.status,
            }
            .into());
        }

        Ok(selected.into_iter().collect())
    }

    /// Applies a fact to state
    fn apply_event(state: &mut AdmissionState, action: &AdmissionAction) {
        match action {
            AdmissionAction::RequestSubmitted(submitted) => {
                if submitted.status == RequestStatus::Confirmed {
                    state.confirmed += 1;
                }
                state.submitted.push(submitted.clone());
                state.last_error = None;
            },
            AdmissionAction::RequestStatusChanged { request_id, from, to } => {
                if let Some(request) = state.requests.get_mut(request_id) {
                    request.status = *to;
                }
                if *from == RequestStatus::Confirmed {
                    state.confirmed = state.confirmed.saturating_sub(1);
                }
                if *to == RequestStatus::Confirmed {
                    state.confirmed += 1;
                }
                state.touched.push(*request_id);
                state.last_error = None;
            },
            AdmissionAction::AdmissionRejected { error } => {
                state.last_error = Some(error.clone());
            },
            // Commands don't modify state
            AdmissionAction::SubmitRequest { .. }
            | AdmissionAction::CancelRequest { .. }
            | AdmissionAction::ModerateRequests { .. } => {},
        }
    }

    fn reject(state: &mut AdmissionState, error: DomainError) -> SmallVec<[Effect<AdmissionAction>; 4]> {
        Self::apply_event(state, &AdmissionAction::AdmissionRejected { error });
        SmallVec::new()
    }
}

impl Reducer for AdmissionReducer {
    type State = AdmissionState;
    type Action = AdmissionAction;
    type Environment = AdmissionEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            AdmissionAction::SubmitRequest { requester_id } => {
                if let Err(error) = Self::validate_submit(state, requester_id) {
                    return Self::reject(state, error);
                }

                let event = &state.event;
                let status = if !event.request_moderation || event.limit().is_unlimited() {
                    RequestStatus::Confirmed
                } else {
                    RequestStatus::Pending
                };

                let fact = AdmissionAction::RequestSubmitted(SubmittedRequest {
                    event_id: event.id,
                    requester_id,
                    status,
                    created: env.clock.now(),
                });
                Self::apply_event(state, &fact);

                smallvec![Effect::Persist(fact)]
            },

            AdmissionAction::CancelRequest { request_id, requester_id } => {
                match Self::validate_cancel(state, request_id, requester_id) {
                    Err(error) => Self::reject(state, error),
                    Ok(false) => SmallVec::new(),
                    Ok(true) => {
                        let from = state
                            .requests
                            .get(&request_id)
                            .map_or(RequestStatus::Pending, |r| r.status);
                        let fact = AdmissionAction::RequestStatusChanged {
                            request_id,
                            from,
                            to: RequestStatus::Canceled,
                        };
                        Self::apply_event(state, &fact);

                        smallvec![Effect::Persist(fact)]
                    },
                }
            },

            AdmissionAction::ModerateRequests { owner_id, request_ids, status } => {
                let selected =
                    match Self::validate_moderation(state, owner_id, &request_ids, status) {
                        Ok(selected) => selected,
                        Err(error) => return Self::reject(state, error),
                    };

                // Spillover: once the limit is reached the rest of a
                // confirmation batch is rejected instead of failing the batch
                let mut facts = Vec::with_capacity(selected.len());
                for request_id in selected {
                    let to = if status == RequestStatus::Confirmed
                        && state.event.limit().has_room(state.confirmed)
                    {
                        RequestStatus::Confirmed
                    } else {
                        RequestStatus::Rejected
                    };
                    let fact = AdmissionAction::RequestStatusChanged {
                        request_id,
                        from: RequestStatus::Pending,
                        to,
                    };
                    Self::apply_event(state, &fact);
                    facts.push(Effect::Persist(fact));
                }

                if facts.is_empty() {
                    return SmallVec::new();
                }
                smallvec![Effect::chain(facts)]
            },

            // ========== Facts ==========
            fact @ (AdmissionAction::RequestSubmitted(_)
            | AdmissionAction::RequestStatusChanged { .. }
            | AdmissionAction::AdmissionRejected { .. }) => {
                Self::apply_event(state, &fact);
                SmallVec::new()
            },
        }
    }
}
