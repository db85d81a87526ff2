//! # Eventhub Server
//!
//! HTTP service for public events with capacity-limited, optionally moderated
//! registration.
//!
//! Writes go straight to an [`EventHubStore`](eventhub_core::store::EventHubStore),
//! whose admission and publication reducers decide every state change inside
//! a per-event lock. Reads go through [`EventService`](service::EventService),
//! which attaches confirmed counts and view counts.
//!
//! ## Example
//!
//! ```ignore
//! let state = AppState::new(store, stats, Arc::new(SystemClock), Settings::default());
//! let app = build_router(state);
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod dto;
pub mod metrics;
pub mod routes;
pub mod service;
pub mod state;

pub use config::{Config, Settings};
pub use routes::build_router;
pub use state::AppState;
