//! Event publication state machine.
//!
//! ```text
//!            SEND_TO_REVIEW (owner)
//!        ┌──────────────────────────┐
//!        ▼                          │
//!    PENDING ── CANCEL_REVIEW ──▶ CANCELED
//!        │      (owner)             ▲
//!        │                          │ REJECT_EVENT (admin, not from PUBLISHED)
//!        └── PUBLISH_EVENT ──▶ PUBLISHED
//!            (admin, from PENDING only)
//! ```
//!
//! Owners cannot touch a published event at all.

use super::patch::{Actor, EventUpdate};
use crate::effect::Effect;
use crate::environment::Clock;
use crate::error::{ConflictReason, DomainError, Entity, Result};
use crate::reducer::Reducer;
use crate::types::{CategoryId, Event, EventState, StateAction};
use chrono::Duration;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

// ============================================================================
// Actions
// ============================================================================

/// Actions for the publication state machine
#[derive(Clone, Debug, PartialEq)]
pub enum PublicationAction {
    // Commands
    /// Patch fields and optionally change lifecycle state
    UpdateEvent {
        /// Who is asking
        actor: Actor,
        /// What to change
        update: EventUpdate,
    },

    // Facts
    /// The event row must be rewritten
    EventUpdated {
        /// New row contents
        event: Box<Event>,
    },

    /// The update was refused
    UpdateRejected {
        /// Why
        error: DomainError,
    },
}

// ============================================================================
// State
// ============================================================================

/// Locked snapshot of the event being updated
#[derive(Clone, Debug, PartialEq)]
pub struct PublicationState {
    /// The event
    pub event: Event,
    /// Live `CONFIRMED` requests for the event
    pub confirmed: u32,
    /// The category named by the patch, if the store found it
    pub known_category: Option<CategoryId>,
    /// Last error, if any
    pub last_error: Option<DomainError>,
}

impl PublicationState {
    /// Creates a snapshot
    #[must_use]
    pub const fn new(event: Event, confirmed: u32) -> Self {
        Self {
            event,
            confirmed,
            known_category: None,
            last_error: None,
        }
    }

    /// Records that the patch's category exists
    #[must_use]
    pub const fn with_known_category(mut self, category_id: Option<CategoryId>) -> Self {
        self.known_category = category_id;
        self
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the publication state machine
#[derive(Clone)]
pub struct PublicationEnvironment {
    /// Clock for `publishedOn` and lead-time checks
    pub clock: Arc<dyn Clock>,
    /// Minimum time between an owner's update and the event date
    pub owner_min_lead: Duration,
    /// Minimum time between an administrator's update and the event date
    pub admin_min_lead: Duration,
}

impl PublicationEnvironment {
    /// Creates a new `PublicationEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, owner_min_lead: Duration, admin_min_lead: Duration) -> Self {
        Self {
            clock,
            owner_min_lead,
            admin_min_lead,
        }
    }

    const fn lead_for(&self, actor: Actor) -> Duration {
        match actor {
            Actor::Owner(_) => self.owner_min_lead,
            Actor::Admin => self.admin_min_lead,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for event updates by owners and administrators
#[derive(Clone, Debug, Default)]
pub struct PublicationReducer;

impl PublicationReducer {
    /// Creates a new `PublicationReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs one update and returns the facts to persist.
    ///
    /// # Errors
    ///
    /// Returns the [`DomainError`] the update was refused with.
    pub fn execute(
        &self,
        state: &mut PublicationState,
        action: PublicationAction,
        env: &PublicationEnvironment,
    ) -> Result<Vec<PublicationAction>> {
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

    /// Checks who may use which lifecycle action from which state
    fn validate_transition(state: &PublicationState, actor: Actor, action: Option<StateAction>) -> Result<()> {
        let event = &state.event;

        match actor {
            Actor::Owner(user_id) => {
                if !event.is_owned_by(user_id) {
                    return Err(DomainError::not_found(Entity::Event, event.id));
                }
                if event.state == EventState::Published {
                    return Err(ConflictReason::PublishedEventLocked { event_id: event.id }.into());
                }
                if let Some(action) = action.filter(|a| a.is_admin_action()) {
                    return Err(DomainError::validation(format!(
                        "{action} is reserved for administrators"
                    )));
                }
            },
            Actor::Admin => match action {
                Some(action @ (StateAction::SendToReview | StateAction::CancelReview)) => {
                    return Err(DomainError::validation(format!(
                        "{action} is reserved for the event initiator"
                    )));
                },
                Some(StateAction::PublishEvent) if event.state != EventState::Pending => {
                    return Err(ConflictReason::IllegalTransition {
                        event_id: event.id,
                        from: event.state,
                        action: StateAction::PublishEvent,
                    }
                    .into());
                },
                Some(StateAction::RejectEvent) if event.state == EventState::Published => {
                    return Err(ConflictReason::IllegalTransition {
                        event_id: event.id,
                        from: event.state,
                        action: StateAction::RejectEvent,
                    }
                    .into());
                },
                _ => {},
            },
        }

        Ok(())
    }

    /// Validates the field patch
    fn validate_patch(
        state: &PublicationState,
        update: &EventUpdate,
        env: &PublicationEnvironment,
        actor: Actor,
    ) -> Result<()> {
        let patch = &update.patch;
        patch.validate(env.clock.now(), env.lead_for(actor))?;

        if let Some(category_id) = patch
            .category_id
            .filter(|id| state.known_category != Some(*id))
        {
            return Err(DomainError::not_found(Entity::Category, category_id));
        }

        // Limit may not drop below the confirmed count
        if patch
            .participant_limit
            .is_some_and(|limit| limit != 0 && limit < state.confirmed)
        {
            return Err(ConflictReason::LimitBelowConfirmed {
                event_id: state.event.id,
                confirmed: state.confirmed,
            }
            .into());
        }

        Ok(())
    }

    /// Applies a fact to state
    fn apply_event(state: &mut PublicationState, action: &PublicationAction) {
        match action {
            PublicationAction::EventUpdated { event } => {
                state.event = (**event).clone();
                state.last_error = None;
            },
            PublicationAction::UpdateRejected { error } => {
                state.last_error = Some(error.clone());
            },
            PublicationAction::UpdateEvent { .. } => {},
        }
    }
}

impl Reducer for PublicationReducer {
    type State = PublicationState;
    type Action = PublicationAction;
    type Environment = PublicationEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            PublicationAction::UpdateEvent { actor, update } => {
                let validation = Self::validate_transition(state, actor, update.state_action)
                    .and_then(|()| Self::validate_patch(state, &update, env, actor));
                if let Err(error) = validation {
                    Self::apply_event(state, &PublicationAction::UpdateRejected { error });
                    return SmallVec::new();
                }

                let mut event = state.event.clone();
                update.patch.apply_to(&mut event);

                match update.state_action {
                    Some(StateAction::CancelReview) => event.state = EventState::Canceled,
                    Some(StateAction::SendToReview) => event.state = EventState::Pending,
                    Some(StateAction::PublishEvent) => {
                        event.state = EventState::Published;
                        event.published_on = Some(env.clock.now());
                        event.moderation_comment = None;
                    },
                    Some(StateAction::RejectEvent) => {
                        event.state = EventState::Canceled;
                        event.moderation_comment = update.moderation_comment;
                    },
                    None => {},
                }

                let fact = PublicationAction::EventUpdated { event: Box::new(event) };
                Self::apply_event(state, &fact);

                smallvec![Effect::Persist(fact)]
            },

            fact @ (PublicationAction::EventUpdated { .. } | PublicationAction::UpdateRejected { .. }) => {
                Self::apply_event(state, &fact);
                SmallVec::new()
            },
        }
    }
}
