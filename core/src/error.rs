//! Error taxonomy shared by reducers, stores and transports.
//!
//! Ownership failures are reported as [`DomainError::NotFound`] so callers
//! cannot tell whether resources they do not own exist.

use crate::types::{
    CategoryId, CompilationId, EventId, EventState, RequestId, RequestStatus, StateAction, UserId,
};
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DomainError>;

/// Kind of entity a [`DomainError::NotFound`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// An event
    Event,
    /// A participation request
    Request,
    /// A user
    User,
    /// A category
    Category,
    /// An event compilation
    Compilation,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Event => "Event",
            Self::Request => "Request",
            Self::User => "User",
            Self::Category => "Category",
            Self::Compilation => "Compilation",
        };
        f.write_str(name)
    }
}

/// Why a command conflicts with the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConflictReason {
    /// The requester already has a request for this event
    DuplicateRequest {
        /// Event ID
        event_id: EventId,
        /// Participant
        requester_id: UserId,
    },
    /// No confirmed slot is left
    CapacityExceeded {
        /// Event ID
        event_id: EventId,
    },
    /// Owners do not register for their own events
    OwnRequest {
        /// Event ID
        event_id: EventId,
    },
    /// Bulk moderation on an event without a participant limit
    UnlimitedEvent {
        /// Event ID
        event_id: EventId,
    },
    /// Bulk moderation on an event that auto-confirms
    NotModerated {
        /// Event ID
        event_id: EventId,
    },
    /// A batch member is not `PENDING`
    RequestNotPending {
        /// Offending request
        request_id: RequestId,
        /// Its current status
        status: RequestStatus,
    },
    /// Lifecycle action not allowed from the current state
    IllegalTransition {
        /// Event ID
        event_id: EventId,
        /// Current state
        from: EventState,
        /// Attempted action
        action: StateAction,
    },
    /// Owners cannot edit a published event
    PublishedEventLocked {
        /// Event ID
        event_id: EventId,
    },
    /// A new participant limit would fall below the confirmed count
    LimitBelowConfirmed {
        /// Event ID
        event_id: EventId,
        /// Confirmed requests at the time of the update
        confirmed: u32,
    },
    /// Category name already taken
    DuplicateName(String),
    /// User email already registered
    DuplicateEmail(String),
    /// Category still referenced by events
    CategoryInUse(CategoryId),
}

impl ConflictReason {
    /// Stable label used for metrics and error codes.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DuplicateRequest { .. } => "duplicate_request",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::OwnRequest { .. } => "own_request",
            Self::UnlimitedEvent { .. } => "unlimited_event",
            Self::NotModerated { .. } => "not_moderated",
            Self::RequestNotPending { .. } => "request_not_pending",
            Self::IllegalTransition { .. } => "illegal_transition",
            Self::PublishedEventLocked { .. } => "published_event_locked",
            Self::LimitBelowConfirmed { .. } => "limit_below_confirmed",
            Self::DuplicateName(_) => "duplicate_name",
            Self::DuplicateEmail(_) => "duplicate_email",
            Self::CategoryInUse(_) => "category_in_use",
        }
    }
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRequest { event_id, requester_id } => write!(
                f,
                "user {requester_id} already has a request for event {event_id}"
            ),
            Self::CapacityExceeded { event_id } => {
                write!(f, "participant limit of event {event_id} has been reached")
            },
            Self::OwnRequest { event_id } => {
                write!(f, "initiator cannot request participation in own event {event_id}")
            },
            Self::UnlimitedEvent { event_id } => {
                write!(f, "event {event_id} has no participant limit, cannot moderate")
            },
            Self::NotModerated { event_id } => write!(f, "event {event_id} is not moderated"),
            Self::RequestNotPending { request_id, status } => {
                write!(f, "request {request_id} is {status}, only PENDING requests can be moderated")
            },
            Self::IllegalTransition { event_id, from, action } => {
                write!(f, "cannot apply {action} to event {event_id} in state {from}")
            },
            Self::PublishedEventLocked { event_id } => {
                write!(f, "published event {event_id} cannot be changed")
            },
            Self::LimitBelowConfirmed { event_id, confirmed } => write!(
                f,
                "participant limit of event {event_id} cannot be below {confirmed} confirmed requests"
            ),
            Self::DuplicateName(name) => write!(f, "name '{name}' is already used"),
            Self::DuplicateEmail(email) => write!(f, "email '{email}' is already registered"),
            Self::CategoryInUse(id) => write!(f, "category {id} is used by events"),
        }
    }
}

/// Errors surfaced by every domain operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Entity missing or not visible to the caller
    #[error("{entity} with id={id} was not found")]
    NotFound {
        /// Entity kind
        entity: Entity,
        /// Raw id that was looked up
        id: i64,
    },

    /// Command conflicts with current state
    #[error("{0}")]
    Conflict(ConflictReason),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Backing store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A collaborator (e.g. the stats service) is unreachable
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    /// Builds a [`DomainError::NotFound`].
    #[must_use]
    pub fn not_found(entity: Entity, id: impl Into<i64>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// Builds a [`DomainError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Builds a [`DomainError::Storage`].
    #[must_use]
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Stable label used for metrics and error codes.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(reason) => reason.label(),
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
            Self::Unavailable(_) => "unavailable",
        }
    }
}

impl From<ConflictReason> for DomainError {
    fn from(reason: ConflictReason) -> Self {
        Self::Conflict(reason)
    }
}

macro_rules! id_into_i64 {
    ($($id:ty),*) => {
        $(impl From<$id> for i64 {
            fn from(id: $id) -> Self {
                id.get()
            }
        })*
    };
}

id_into_i64!(EventId, RequestId, UserId, CategoryId, CompilationId);
