//! Response shapes of the event endpoints.
//!
//! Stored events carry only ids for their category and initiator; listings
//! embed both, plus the confirmed count and, on public paths, the view count.

use eventhub_core::types::{
    timestamp, Category, CompilationId, Event, EventId, EventState, Location, User, UserId,
};
use eventhub_core::{DateTime, DomainError, Result, Utc};
use serde::{Deserialize, Serialize};

/// Public part of a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserShort {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: String,
}

impl From<User> for UserShort {
    fn from(user: User) -> Self {
        Self { id: user.id, name: user.name }
    }
}

/// Sort order of the public search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventSort {
    /// Ascending event date
    EventDate,
    /// Most viewed first
    Views,
}

impl EventSort {
    /// Parses `EVENT_DATE` or `VIEWS`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for any other value.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "EVENT_DATE" => Ok(Self::EventDate),
            "VIEWS" => Ok(Self::Views),
            other => Err(DomainError::validation(format!(
                "sort must be EVENT_DATE or VIEWS, got {other:?}"
            ))),
        }
    }
}

/// Event with everything a detail view shows
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFull {
    /// Event ID
    pub id: EventId,
    /// Short title
    pub title: String,
    /// Teaser text
    pub annotation: String,
    /// Full description
    pub description: String,
    /// Category
    pub category: Category,
    /// Owner
    pub initiator: UserShort,
    /// Where it happens
    pub location: Location,
    /// Whether participation is paid
    pub paid: bool,
    /// Maximum confirmed requests, `0` for unlimited
    pub participant_limit: u32,
    /// Whether requests need owner approval
    pub request_moderation: bool,
    /// When it happens
    #[serde(with = "timestamp")]
    pub event_date: DateTime<Utc>,
    /// When it was created
    #[serde(with = "timestamp")]
    pub created_on: DateTime<Utc>,
    /// When it was published
    #[serde(with = "timestamp::option", default)]
    pub published_on: Option<DateTime<Utc>>,
    /// Administrative lifecycle state
    pub state: EventState,
    /// Administrator's rejection comment
    #[serde(default)]
    pub moderation_comment: Option<String>,
    /// Number of `CONFIRMED` requests
    pub confirmed_requests: u32,
    /// Unique visitors, reported on public paths only
    #[serde(default)]
    pub views: Option<u64>,
}

impl EventFull {
    /// Combines a stored event with its related records
    #[must_use]
    pub fn new(
        event: Event,
        category: Category,
        initiator: UserShort,
        confirmed_requests: u32,
        views: Option<u64>,
    ) -> Self {
        Self {
            id: event.id,
            title: event.title,
            annotation: event.annotation,
            description: event.description,
            category,
            initiator,
            location: event.location,
            paid: event.paid,
            participant_limit: event.participant_limit,
            request_moderation: event.request_moderation,
            event_date: event.event_date,
            created_on: event.created_on,
            published_on: event.published_on,
            state: event.state,
            moderation_comment: event.moderation_comment,
            confirmed_requests,
            views,
        }
    }
}

/// Event as shown in public listings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventShort {
    /// Event ID
    pub id: EventId,
    /// Short title
    pub title: String,
    /// Teaser text
    pub annotation: String,
    /// Category
    pub category: Category,
    /// Owner
    pub initiator: UserShort,
    /// Whether participation is paid
    pub paid: bool,
    /// When it happens
    #[serde(with = "timestamp")]
    pub event_date: DateTime<Utc>,
    /// Number of `CONFIRMED` requests
    pub confirmed_requests: u32,
    /// Unique visitors
    #[serde(default)]
    pub views: Option<u64>,
}

impl From<EventFull> for EventShort {
    fn from(event: EventFull) -> Self {
        Self {
            id: event.id,
            title: event.title,
            annotation: event.annotation,
            category: event.category,
            initiator: event.initiator,
            paid: event.paid,
            event_date: event.event_date,
            confirmed_requests: event.confirmed_requests,
            views: event.views,
        }
    }
}

/// Compilation with its member events expanded
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompilationDto {
    /// Compilation ID
    pub id: CompilationId,
    /// Unique title
    pub title: String,
    /// Whether it is pinned
    pub pinned: bool,
    /// Member events, ascending id
    pub events: Vec<EventShort>,
}
