//! Database rows and their conversion into domain types.

use chrono::{DateTime, Utc};
use eventhub_core::types::{
    Category, CategoryId, Compilation, CompilationId, Event, EventId, EventState, Location,
    ParticipationRequest, RequestId, RequestStatus, User, UserId,
};
use eventhub_core::{DomainError, Result};

/// Column list shared by every event query
pub(crate) const EVENT_COLUMNS: &str = "e.id, e.title, e.annotation, e.description, \
     e.category_id, e.initiator_id, e.lat, e.lon, e.paid, e.participant_limit, \
     e.request_moderation, e.event_date, e.created_on, e.published_on, e.state, \
     e.moderation_comment";

#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    id: i64,
    name: String,
    email: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self { id: UserId::new(row.id), name: row.name, email: row.email }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CategoryRow {
    id: i64,
    name: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self { id: CategoryId::new(row.id), name: row.name }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct EventRow {
    id: i64,
    title: String,
    annotation: String,
    description: String,
    category_id: i64,
    initiator_id: i64,
    lat: f64,
    lon: f64,
    paid: bool,
    participant_limit: i32,
    request_moderation: bool,
    event_date: DateTime<Utc>,
    created_on: DateTime<Utc>,
    published_on: Option<DateTime<Utc>>,
    state: String,
    moderation_comment: Option<String>,
}

impl TryFrom<EventRow> for Event {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Self {
            id: EventId::new(row.id),
            title: row.title,
            annotation: row.annotation,
            description: row.description,
            category_id: CategoryId::new(row.category_id),
            initiator_id: UserId::new(row.initiator_id),
            location: Location { lat: row.lat, lon: row.lon },
            paid: row.paid,
            participant_limit: u32::try_from(row.participant_limit)
                .map_err(|_| DomainError::storage(format!("negative limit on event {}", row.id)))?,
            request_moderation: row.request_moderation,
            event_date: row.event_date,
            created_on: row.created_on,
            published_on: row.published_on,
            state: EventState::parse(&row.state).map_err(DomainError::storage)?,
            moderation_comment: row.moderation_comment,
        })
    }
}

/// Compilation with its members folded into one array column
pub(crate) const COMPILATION_SELECT: &str = "SELECT c.id, c.title, c.pinned, \
     COALESCE(ARRAY_AGG(ce.event_id ORDER BY ce.event_id) \
     FILTER (WHERE ce.event_id IS NOT NULL), '{}'::BIGINT[]) AS event_ids \
     FROM compilations c LEFT JOIN compilation_events ce ON ce.compilation_id = c.id";

#[derive(sqlx::FromRow)]
pub(crate) struct CompilationRow {
    id: i64,
    title: String,
    pinned: bool,
    event_ids: Vec<i64>,
}

impl From<CompilationRow> for Compilation {
    fn from(row: CompilationRow) -> Self {
        Self {
            id: CompilationId::new(row.id),
            title: row.title,
            pinned: row.pinned,
            event_ids: row.event_ids.into_iter().map(EventId::new).collect(),
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RequestRow {
    id: i64,
    event_id: i64,
    requester_id: i64,
    status: String,
    created: DateTime<Utc>,
}

impl TryFrom<RequestRow> for ParticipationRequest {
    type Error = DomainError;

    fn try_from(row: RequestRow) -> Result<Self> {
        Ok(Self {
            id: RequestId::new(row.id),
            event_id: EventId::new(row.event_id),
            requester_id: UserId::new(row.requester_id),
            status: RequestStatus::parse(&row.status).map_err(DomainError::storage)?,
            created: row.created,
        })
    }
}

/// Converts a batch of rows, failing on the first malformed one
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = DomainError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Converts a `COUNT(*)` result
pub(crate) fn count(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| DomainError::storage(format!("count out of range: {value}")))
}

/// Converts a participant limit for storage
pub(crate) fn limit_column(limit: u32) -> Result<i32> {
    i32::try_from(limit)
        .map_err(|_| DomainError::validation(format!("participant limit too large: {limit}")))
}
