//! HTTP handlers, grouped by caller.
//!
//! - `admin`: `/admin/...` user, category, compilation and event moderation
//! - `public`: anonymous category, event and compilation reads
//! - `owner`: `/users/{userId}/events/...` authoring and request moderation
//! - `requests`: `/users/{userId}/requests/...` participation
//!
//! Callers identify themselves through the `userId` path segment; ownership
//! failures are reported as `404`.

pub mod admin;
pub mod owner;
pub mod public;
pub mod requests;

use eventhub_core::store::PageRequest;
use eventhub_web::{AppError, Pagination};

use crate::state::AppState;

/// Resolves paging parameters against the configured default size
pub(crate) fn page(state: &AppState, pagination: Pagination) -> Result<PageRequest, AppError> {
    pagination.page(state.settings.default_page_size)
}
