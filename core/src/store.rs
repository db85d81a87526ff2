//! Store abstractions.
//!
//! Stores own the transaction around each reducer run. Every admission
//! operation must, as one atomic unit:
//!
//! 1. lock the event (row lock or per-event mutex),
//! 2. recount its `CONFIRMED` requests,
//! 3. run the reducer,
//! 4. write the resulting facts in order.
//!
//! Traits return `BoxFuture` instead of using `async fn` so they stay
//! dyn-compatible and can be shared as `Arc<dyn EventHubStore>`.

use crate::admission::ModerationResult;
use crate::capacity::ConfirmedCounts;
use crate::error::{DomainError, Result};
use crate::publication::{Actor, EventUpdate};
use crate::types::{
    Category, CategoryId, Compilation, CompilationId, CompilationPatch, Event, EventId, EventState,
    NewCompilation, NewEvent, NewUser, ParticipationRequest, RequestId, RequestStatus, User, UserId,
};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Offset-based page
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Number of items to skip
    pub from: u32,
    /// Maximum number of items to return
    pub size: u32,
}

impl PageRequest {
    /// Creates a page.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] when `size` is zero.
    pub fn new(from: u32, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(DomainError::validation("page size must be positive"));
        }
        Ok(Self { from, size })
    }

    /// Offset for SQL `OFFSET`
    #[must_use]
    pub fn offset(self) -> i64 {
        i64::from(self.from)
    }

    /// Limit for SQL `LIMIT`
    #[must_use]
    pub fn limit(self) -> i64 {
        i64::from(self.size)
    }

    /// Applies the page to an already ordered iterator
    pub fn slice<T>(self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.from as usize)
            .take(self.size as usize)
            .collect()
    }
}

/// Ordering of event listings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EventOrder {
    /// Ascending id
    #[default]
    Id,
    /// Ascending event date, then id
    EventDate,
}

/// Event search criteria; empty collections and `None` mean "any"
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    /// Restrict to these events
    pub ids: Vec<EventId>,
    /// Restrict to these initiators
    pub initiators: Vec<UserId>,
    /// Restrict to these states
    pub states: Vec<EventState>,
    /// Restrict to these categories
    pub categories: Vec<CategoryId>,
    /// Case-insensitive substring of annotation or description
    pub text: Option<String>,
    /// Paid flag
    pub paid: Option<bool>,
    /// Events on or after this instant
    pub range_start: Option<DateTime<Utc>>,
    /// Events on or before this instant
    pub range_end: Option<DateTime<Utc>>,
    /// Only events with a free confirmed slot
    pub only_available: bool,
    /// Sort order
    pub order: EventOrder,
}

impl EventFilter {
    /// Checks the date range.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] when the range is inverted.
    pub fn validate(&self) -> Result<()> {
        match (self.range_start, self.range_end) {
            (Some(start), Some(end)) if start > end => Err(DomainError::validation(
                "range start must not be after range end",
            )),
            _ => Ok(()),
        }
    }

    /// Lower-cased search text, if any non-blank text was given
    #[must_use]
    pub fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_lowercase)
    }

    /// Whether `event`, with `confirmed` confirmed requests, passes the filter
    #[must_use]
    pub fn matches(&self, event: &Event, confirmed: u32) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&event.id) {
            return false;
        }
        if !self.initiators.is_empty() && !self.initiators.contains(&event.initiator_id) {
            return false;
        }
        if !self.states.is_empty() && !self.states.contains(&event.state) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&event.category_id) {
            return false;
        }
        if let Some(needle) = self.needle() {
            let haystacks = [&event.annotation, &event.description];
            if !haystacks.iter().any(|h| h.to_lowercase().contains(&needle)) {
                return false;
            }
        }
        if self.paid.is_some_and(|paid| paid != event.paid) {
            return false;
        }
        if self.range_start.is_some_and(|start| event.event_date < start) {
            return false;
        }
        if self.range_end.is_some_and(|end| event.event_date > end) {
            return false;
        }
        if self.only_available && !event.limit().has_room(confirmed) {
            return false;
        }
        true
    }
}

/// Bulk moderation request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDecision {
    /// Requests to decide on
    pub request_ids: Vec<RequestId>,
    /// `CONFIRMED` or `REJECTED`
    pub status: RequestStatus,
}

/// Users and categories
pub trait Directory: Send + Sync {
    /// Registers a user.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed input, `Conflict(DuplicateEmail)` for a taken email.
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>>;

    /// Loads a user.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<User>>;

    /// Lists users by id (all users when `ids` is empty), ascending id.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn list_users(&self, ids: Vec<UserId>, page: PageRequest) -> BoxFuture<'_, Result<Vec<User>>>;

    /// Deletes a user along with their events and requests.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn delete_user(&self, id: UserId) -> BoxFuture<'_, Result<()>>;

    /// Creates a category.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad name, `Conflict(DuplicateName)` for a taken one.
    fn create_category(&self, name: String) -> BoxFuture<'_, Result<Category>>;

    /// Renames a category.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Validation` or `Conflict(DuplicateName)`.
    fn rename_category(&self, id: CategoryId, name: String) -> BoxFuture<'_, Result<Category>>;

    /// Deletes a category no event references.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Conflict(CategoryInUse)`.
    fn delete_category(&self, id: CategoryId) -> BoxFuture<'_, Result<()>>;

    /// Loads a category.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn get_category(&self, id: CategoryId) -> BoxFuture<'_, Result<Category>>;

    /// Lists categories, ascending id.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn list_categories(&self, page: PageRequest) -> BoxFuture<'_, Result<Vec<Category>>>;
}

/// Event authoring and lookup
pub trait EventCatalog: Send + Sync {
    /// Creates a `PENDING` event.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown initiator or category, `Validation` for bad input.
    fn create_event(&self, initiator_id: UserId, input: NewEvent) -> BoxFuture<'_, Result<Event>>;

    /// Loads an event regardless of state.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn get_event(&self, id: EventId) -> BoxFuture<'_, Result<Event>>;

    /// Searches events.
    ///
    /// # Errors
    ///
    /// `Validation` for an inverted date range.
    fn list_events(&self, filter: EventFilter, page: PageRequest) -> BoxFuture<'_, Result<Vec<Event>>>;

    /// Runs the publication state machine on a locked event.
    ///
    /// # Errors
    ///
    /// Whatever the publication reducer refuses the update with.
    fn update_event(
        &self,
        id: EventId,
        actor: Actor,
        update: EventUpdate,
    ) -> BoxFuture<'_, Result<Event>>;
}

/// Participation requests and capacity accounting
pub trait AdmissionStore: Send + Sync {
    /// Submits a request for a published event.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user or unpublished event, `Conflict` for
    /// own event, full event or duplicate.
    fn submit_request(
        &self,
        event_id: EventId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>>;

    /// Cancels the caller's own request.
    ///
    /// # Errors
    ///
    /// `NotFound` when the request is absent or belongs to someone else,
    /// canceling an already canceled request changes nothing.
    fn cancel_request(
        &self,
        request_id: RequestId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>>;

    /// Confirms or rejects pending requests of an event in bulk.
    ///
    /// # Errors
    ///
    /// `Validation`, `NotFound` or `Conflict` as decided by the admission reducer.
    fn moderate_requests(
        &self,
        event_id: EventId,
        owner_id: UserId,
        decision: StatusDecision,
    ) -> BoxFuture<'_, Result<ModerationResult>>;

    /// Requests made by a participant, ascending id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    fn requests_of(&self, requester_id: UserId) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>>;

    /// Requests for an event, visible to its initiator only.
    ///
    /// # Errors
    ///
    /// `NotFound` when the event is absent or owned by someone else.
    fn requests_for_event(
        &self,
        event_id: EventId,
        owner_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>>;

    /// Number of `CONFIRMED` requests for an event.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn confirmed_count(&self, event_id: EventId) -> BoxFuture<'_, Result<u32>>;

    /// Confirmed counts for many events in one grouped query.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn confirmed_counts(&self, event_ids: Vec<EventId>) -> BoxFuture<'_, Result<ConfirmedCounts>>;
}

/// Curated event lists
pub trait CompilationStore: Send + Sync {
    /// Creates a compilation.
    ///
    /// # Errors
    ///
    /// `Validation` for a bad title, `Conflict` for a taken title,
    /// `NotFound` for an unknown member event.
    fn create_compilation(&self, input: NewCompilation) -> BoxFuture<'_, Result<Compilation>>;

    /// Applies a partial update; a present event list replaces the members.
    ///
    /// # Errors
    ///
    /// As for creation, plus `NotFound` when the compilation is absent.
    fn update_compilation(
        &self,
        id: CompilationId,
        patch: CompilationPatch,
    ) -> BoxFuture<'_, Result<Compilation>>;

    /// Deletes a compilation; member events are untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn delete_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<()>>;

    /// Loads a compilation.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    fn get_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<Compilation>>;

    /// Lists compilations, ascending id, optionally by pinned flag.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    fn list_compilations(
        &self,
        pinned: Option<bool>,
        page: PageRequest,
    ) -> BoxFuture<'_, Result<Vec<Compilation>>>;
}

/// Everything the server needs from a backend
pub trait EventHubStore: Directory + EventCatalog + AdmissionStore + CompilationStore {}

impl<T: Directory + EventCatalog + AdmissionStore + CompilationStore> EventHubStore for T {}
