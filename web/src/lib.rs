//! Axum plumbing shared by the eventhub services.
//!
//! Handlers stay thin: extract input, call a store or service, map the
//! result. This crate supplies the pieces every handler needs:
//!
//! - [`AppError`]: turns a [`DomainError`](eventhub_core::DomainError) into an
//!   HTTP response with a `{code, message}` body
//! - extractors for client address, correlation id, pagination, and JSON
//!   bodies / query strings whose rejections are reported as `400`, and
//!   [`QueryPairs`] for list-valued query parameters
//! - correlation id middleware, a liveness handler and a shutdown signal
//!
//! # Example
//!
//! ```ignore
//! use eventhub_web::{AppError, AppJson, Pagination};
//!
//! async fn list_users(
//!     State(state): State<AppState>,
//!     pagination: Pagination,
//! ) -> Result<Json<Vec<User>>, AppError> {
//!     let page = pagination.page(state.settings.default_page_size)?;
//!     Ok(Json(state.store.list_users(Vec::new(), page).await?))
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod query;
pub mod shutdown;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{AppJson, AppPath, ClientIp, CorrelationId, Pagination};
pub use middleware::{correlation_id, CORRELATION_ID_HEADER};
pub use query::QueryPairs;
pub use shutdown::shutdown_signal;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
