//! # Eventhub Stats
//!
//! A small service that records page visits and reports visit counts, plus
//! the HTTP client the main service uses to talk to it.
//!
//! | Method | Path      | Body / query                                  | Response                |
//! |--------|-----------|-----------------------------------------------|-------------------------|
//! | POST   | `/hit`    | `{app, uri, ip, timestamp}`                   | `201` with the stored hit |
//! | GET    | `/stats`  | `start`, `end`, optional `uris`, `unique`     | `200` with `[{app, uri, hits}]` |
//! | GET    | `/health` |                                               | `200`                   |
//!
//! Timestamps use `yyyy-MM-dd HH:mm:ss` in UTC.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod routes;

pub use client::HttpStatsClient;
pub use config::StatsConfig;
pub use routes::router;
