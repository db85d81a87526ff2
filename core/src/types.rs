//! Domain types for the event hub.
//!
//! Identifiers, lifecycle enums and the records the admission and publication
//! reducers operate on.

use crate::capacity::ParticipantLimit;
use crate::error::{DomainError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            #[doc = concat!("Wraps a raw database id as a `", stringify!($name), "`")]
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw id
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

numeric_id!(
    /// Unique identifier for an event
    EventId
);
numeric_id!(
    /// Unique identifier for a participation request
    RequestId
);
numeric_id!(
    /// Unique identifier for a user (initiator, participant)
    UserId
);
numeric_id!(
    /// Unique identifier for a category
    CategoryId
);
numeric_id!(
    /// Unique identifier for an event compilation
    CompilationId
);

// ============================================================================
// Wire timestamps
// ============================================================================

/// Serde adapter for timestamps exchanged as `yyyy-MM-dd HH:mm:ss` (UTC).
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Format used on the wire and in query strings.
    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    /// Formats a timestamp in wire format.
    #[must_use]
    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(FORMAT).to_string()
    }

    /// Parses a wire-format timestamp.
    ///
    /// # Errors
    ///
    /// Returns the chrono parse error if `raw` does not match [`FORMAT`].
    pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        NaiveDateTime::parse_from_str(raw, FORMAT).map(|naive| naive.and_utc())
    }

    /// Serializes a timestamp in wire format.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    /// Deserializes a wire-format timestamp.
    ///
    /// # Errors
    ///
    /// Fails if the string does not match [`FORMAT`].
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    /// Same adapter for optional fields.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes an optional timestamp.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_some(&super::format(value)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional timestamp.
        ///
        /// # Errors
        ///
        /// Fails if a present string does not match the wire format.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// ============================================================================
// Lifecycle enums
// ============================================================================

/// Administrative lifecycle of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventState {
    /// Awaiting administrator review
    Pending,
    /// Visible to participants and open for requests
    Published,
    /// Withdrawn by the owner or rejected by an administrator
    Canceled,
}

impl EventState {
    /// Database/wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Published => "PUBLISHED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parses the database/wire representation
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(Self::Pending),
            "PUBLISHED" => Ok(Self::Published),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(DomainError::validation(format!("unknown event state '{other}'"))),
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a participation request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Waiting for the owner's decision
    Pending,
    /// Counted against the participant limit
    Confirmed,
    /// Declined by the owner or by spillover
    Rejected,
    /// Withdrawn by the requester
    Canceled,
}

impl RequestStatus {
    /// Database/wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Rejected => "REJECTED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parses the database/wire representation
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for unknown values.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "REJECTED" => Ok(Self::Rejected),
            "CANCELED" => Ok(Self::Canceled),
            other => Err(DomainError::validation(format!("unknown request status '{other}'"))),
        }
    }

    /// Whether an owner may move a request to this status in bulk
    #[must_use]
    pub const fn is_moderation_target(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle action attached to an event update
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateAction {
    /// Owner: resubmit a canceled event for review
    SendToReview,
    /// Owner: withdraw a pending event
    CancelReview,
    /// Admin: publish a pending event
    PublishEvent,
    /// Admin: reject an unpublished event
    RejectEvent,
}

impl StateAction {
    /// Whether only administrators may use this action
    #[must_use]
    pub const fn is_admin_action(self) -> bool {
        matches!(self, Self::PublishEvent | Self::RejectEvent)
    }
}

impl fmt::Display for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendToReview => "SEND_TO_REVIEW",
            Self::CancelReview => "CANCEL_REVIEW",
            Self::PublishEvent => "PUBLISH_EVENT",
            Self::RejectEvent => "REJECT_EVENT",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Geographic location of an event
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lon: f64,
}

/// An event participants can register for
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Event ID
    pub id: EventId,
    /// Short title
    pub title: String,
    /// Teaser text
    pub annotation: String,
    /// Full description
    pub description: String,
    /// Category
    pub category_id: CategoryId,
    /// Owner
    pub initiator_id: UserId,
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
    /// When an administrator published it
    #[serde(with = "timestamp::option", default)]
    pub published_on: Option<DateTime<Utc>>,
    /// Administrative lifecycle state
    pub state: EventState,
    /// Comment left by the administrator on rejection
    #[serde(default)]
    pub moderation_comment: Option<String>,
}

impl Event {
    /// Whether the event accepts participation requests
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.state == EventState::Published
    }

    /// Whether `user_id` is the event's initiator
    #[must_use]
    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.initiator_id == user_id
    }

    /// Participant limit as a capacity value
    #[must_use]
    pub const fn limit(&self) -> ParticipantLimit {
        ParticipantLimit::new(self.participant_limit)
    }
}

/// Input for creating an event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    /// Short title (3..=120 chars)
    pub title: String,
    /// Teaser text (20..=2000 chars)
    pub annotation: String,
    /// Full description (20..=7000 chars)
    pub description: String,
    /// Category
    #[serde(rename = "category")]
    pub category_id: CategoryId,
    /// Where it happens
    pub location: Location,
    /// Defaults to `false`
    #[serde(default)]
    pub paid: Option<bool>,
    /// Defaults to `0` (unlimited)
    #[serde(default)]
    pub participant_limit: Option<u32>,
    /// Defaults to `true`
    #[serde(default)]
    pub request_moderation: Option<bool>,
    /// When it happens
    #[serde(with = "timestamp")]
    pub event_date: DateTime<Utc>,
}

/// Length bounds for event text fields, in characters.
pub(crate) const TITLE_LEN: (usize, usize) = (3, 120);
pub(crate) const ANNOTATION_LEN: (usize, usize) = (20, 2000);
pub(crate) const DESCRIPTION_LEN: (usize, usize) = (20, 7000);

/// Checks that a text field is non-blank and within bounds.
pub(crate) fn validate_text(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} must not be blank")));
    }
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max} characters (got {len})"
        )));
    }
    Ok(())
}

/// Checks that `event_date` is at least `lead` after `now`.
pub(crate) fn validate_event_date(
    event_date: DateTime<Utc>,
    now: DateTime<Utc>,
    lead: Duration,
) -> Result<()> {
    if event_date < now + lead {
        return Err(DomainError::validation(format!(
            "event date must be at least {} hour(s) in the future",
            lead.num_hours()
        )));
    }
    Ok(())
}

impl NewEvent {
    /// Validates field bounds and the event date against `now + lead`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] describing the first invalid field.
    pub fn validate(&self, now: DateTime<Utc>, lead: Duration) -> Result<()> {
        validate_text("title", &self.title, TITLE_LEN)?;
        validate_text("annotation", &self.annotation, ANNOTATION_LEN)?;
        validate_text("description", &self.description, DESCRIPTION_LEN)?;
        validate_event_date(self.event_date, now, lead)
    }

    /// Builds the `PENDING` event record with defaults applied.
    #[must_use]
    pub fn into_event(self, id: EventId, initiator_id: UserId, now: DateTime<Utc>) -> Event {
        Event {
            id,
            title: self.title,
            annotation: self.annotation,
            description: self.description,
            category_id: self.category_id,
            initiator_id,
            location: self.location,
            paid: self.paid.unwrap_or(false),
            participant_limit: self.participant_limit.unwrap_or(0),
            request_moderation: self.request_moderation.unwrap_or(true),
            event_date: self.event_date,
            created_on: now,
            published_on: None,
            state: EventState::Pending,
            moderation_comment: None,
        }
    }
}

/// A participant's registration for an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipationRequest {
    /// Request ID
    pub id: RequestId,
    /// Target event
    #[serde(rename = "event")]
    pub event_id: EventId,
    /// Participant
    #[serde(rename = "requester")]
    pub requester_id: UserId,
    /// Current status
    pub status: RequestStatus,
    /// When it was submitted
    #[serde(with = "timestamp")]
    pub created: DateTime<Utc>,
}

/// A registered user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Unique email
    pub email: String,
}

/// Input for creating a user
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    /// Display name (2..=250 chars)
    pub name: String,
    /// Unique email (6..=254 chars)
    pub email: String,
}

impl NewUser {
    /// Validates name and email shape.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for blank, oversized or malformed values.
    pub fn validate(&self) -> Result<()> {
        validate_text("name", &self.name, (2, 250))?;
        validate_text("email", &self.email, (6, 254))?;
        match self.email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
            _ => Err(DomainError::validation("email must be a valid address")),
        }
    }
}

/// An event category
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category ID
    pub id: CategoryId,
    /// Unique name
    pub name: String,
}

/// A curated list of events, optionally pinned to the front page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compilation {
    /// Compilation ID
    pub id: CompilationId,
    /// Unique title
    pub title: String,
    /// Whether it is pinned
    pub pinned: bool,
    /// Member events, ascending id without duplicates
    #[serde(rename = "events")]
    pub event_ids: Vec<EventId>,
}

/// Sorts and deduplicates compilation members
#[must_use]
pub fn normalize_event_ids(mut ids: Vec<EventId>) -> Vec<EventId> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

const COMPILATION_TITLE_LEN: (usize, usize) = (1, 50);

/// Input for creating a compilation
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompilation {
    /// Unique title (1..=50 chars)
    pub title: String,
    /// Defaults to `false`
    #[serde(default)]
    pub pinned: bool,
    /// Member events, may be empty
    #[serde(default)]
    pub events: Vec<EventId>,
}

impl NewCompilation {
    /// Validates the title.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for a blank or oversized title.
    pub fn validate(&self) -> Result<()> {
        validate_text("title", &self.title, COMPILATION_TITLE_LEN)
    }

    /// Builds the record under `id`
    #[must_use]
    pub fn into_compilation(self, id: CompilationId) -> Compilation {
        Compilation {
            id,
            title: self.title,
            pinned: self.pinned,
            event_ids: normalize_event_ids(self.events),
        }
    }
}

/// Partial update of a compilation; absent fields stay unchanged
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationPatch {
    /// New title
    #[serde(default)]
    pub title: Option<String>,
    /// New pinned flag
    #[serde(default)]
    pub pinned: Option<bool>,
    /// Replacement member list
    #[serde(default)]
    pub events: Option<Vec<EventId>>,
}

impl CompilationPatch {
    /// Validates the title when present.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] for a blank or oversized title.
    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => validate_text("title", title, COMPILATION_TITLE_LEN),
            None => Ok(()),
        }
    }

    /// Applies the present fields to `compilation`
    pub fn apply(self, compilation: &mut Compilation) {
        if let Some(title) = self.title {
            compilation.title = title;
        }
        if let Some(pinned) = self.pinned {
            compilation.pinned = pinned;
        }
        if let Some(events) = self.events {
            compilation.event_ids = normalize_event_ids(events);
        }
    }
}

/// Validates a category name (1..=50 chars, non-blank).
///
/// # Errors
///
/// Returns [`DomainError::Validation`] for blank or oversized names.
pub fn validate_category_name(name: &str) -> Result<()> {
    validate_text("name", name, (1, 50))
}
