//! Query strings with list-valued parameters.
//!
//! `serde_urlencoded` cannot collect repeated keys into a `Vec`, so list
//! parameters (`ids=1&ids=2`, `ids=1,2`) are read from the raw pairs.

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use eventhub_core::types::timestamp;
use eventhub_core::{DateTime, Utc};
use std::fmt::Display;
use std::str::FromStr;

/// Decoded `key=value` pairs of the request's query string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPairs(pub Vec<(String, String)>);

impl QueryPairs {
    /// Decodes a raw query string.
    ///
    /// # Errors
    ///
    /// Returns a `400` for malformed percent-encoding.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        serde_urlencoded::from_str(raw)
            .map(Self)
            .map_err(|e| AppError::bad_request(format!("malformed query string: {e}")))
    }

    /// Last value given for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `key`, repeated or comma separated, blanks dropped
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, _)| k == key)
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Parses the value of `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns a `400` naming the parameter when the value does not parse.
    pub fn parse_value<T>(&self, key: &str) -> Result<Option<T>, AppError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.get(key)
            .map(|raw| raw.parse().map_err(|e| invalid(key, raw, &e)))
            .transpose()
    }

    /// Parses every value of `key` with `parse`.
    ///
    /// # Errors
    ///
    /// Returns a `400` for the first value `parse` refuses.
    pub fn list_with<T, E, F>(&self, key: &str, parse: F) -> Result<Vec<T>, AppError>
    where
        E: Display,
        F: Fn(&str) -> Result<T, E>,
    {
        self.values(key)
            .map(|raw| parse(raw).map_err(|e| invalid(key, raw, &e)))
            .collect()
    }

    /// Parses a `yyyy-MM-dd HH:mm:ss` timestamp, if present.
    ///
    /// # Errors
    ///
    /// Returns a `400` when the value has another shape.
    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, AppError> {
        self.get(key)
            .map(|raw| {
                timestamp::parse(raw).map_err(|e| {
                    AppError::bad_request(format!("{key} must look like {}: {e}", timestamp::FORMAT))
                })
            })
            .transpose()
    }
}

fn invalid(key: &str, raw: &str, error: &dyn Display) -> AppError {
    AppError::bad_request(format!("invalid {key} {raw:?}: {error}"))
}

#[async_trait]
impl<S> FromRequestParts<S> for QueryPairs
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::parse(parts.uri.query().unwrap_or_default())
    }
}
