//! View counting.
//!
//! Hits are recorded per `(app, uri, ip)` and aggregated on demand. Event
//! listings use the counts for `/events/{id}` to report views; nothing on the
//! admission path depends on them.

use crate::error::{DomainError, Result};
use crate::types::{timestamp, EventId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A visit to record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHit {
    /// Reporting application
    pub app: String,
    /// Visited resource
    pub uri: String,
    /// Client address
    pub ip: String,
    /// When the visit happened
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl NewHit {
    /// Checks that identifying fields are present.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("app", &self.app), ("uri", &self.uri), ("ip", &self.ip)] {
            if value.trim().is_empty() {
                return Err(DomainError::validation(format!("{field} must not be blank")));
            }
        }
        Ok(())
    }
}

/// A stored visit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// Hit ID
    pub id: i64,
    /// Reporting application
    pub app: String,
    /// Visited resource
    pub uri: String,
    /// Client address
    pub ip: String,
    /// When the visit happened
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl Hit {
    /// Attaches a storage id to a new hit
    #[must_use]
    pub fn from_new(id: i64, hit: NewHit) -> Self {
        Self {
            id,
            app: hit.app,
            uri: hit.uri,
            ip: hit.ip,
            timestamp: hit.timestamp,
        }
    }
}

/// Aggregation window and filters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsQuery {
    /// Window start, inclusive
    pub start: DateTime<Utc>,
    /// Window end, inclusive
    pub end: DateTime<Utc>,
    /// Restrict to these uris; empty means all
    pub uris: Vec<String>,
    /// Count distinct client addresses instead of hits
    pub unique: bool,
}

impl StatsQuery {
    /// Checks the window.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Validation`] when `start` is after `end`.
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(DomainError::validation("start must not be after end"));
        }
        Ok(())
    }

    /// Whether `hit` falls inside the window and uri filter
    #[must_use]
    pub fn covers(&self, hit: &Hit) -> bool {
        hit.timestamp >= self.start
            && hit.timestamp <= self.end
            && (self.uris.is_empty() || self.uris.iter().any(|uri| *uri == hit.uri))
    }
}

/// Hit count for one `(app, uri)` pair
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriStats {
    /// Reporting application
    pub app: String,
    /// Visited resource
    pub uri: String,
    /// Hits, or distinct addresses for unique queries
    pub hits: u64,
}

/// Counts hits per `(app, uri)`, most visited first.
///
/// Ties are broken by app then uri so results are deterministic.
#[must_use]
pub fn aggregate_hits<'a, I>(hits: I, query: &StatsQuery) -> Vec<UriStats>
where
    I: IntoIterator<Item = &'a Hit>,
{
    let mut groups: BTreeMap<(&str, &str), (u64, HashSet<&str>)> = BTreeMap::new();
    for hit in hits.into_iter().filter(|hit| query.covers(hit)) {
        let entry = groups.entry((hit.app.as_str(), hit.uri.as_str())).or_default();
        entry.0 += 1;
        entry.1.insert(hit.ip.as_str());
    }

    let mut stats: Vec<UriStats> = groups
        .into_iter()
        .map(|((app, uri), (total, ips))| UriStats {
            app: app.to_string(),
            uri: uri.to_string(),
            hits: if query.unique { ips.len() as u64 } else { total },
        })
        .collect();
    stats.sort_by(|a, b| b.hits.cmp(&a.hits));
    stats
}

/// Records and aggregates visits
pub trait ViewStats: Send + Sync {
    /// Stores one hit.
    ///
    /// # Errors
    ///
    /// `Validation` for blank fields, `Storage`/`Unavailable` on backend failure.
    fn record_hit(&self, hit: NewHit) -> BoxFuture<'_, Result<Hit>>;

    /// Aggregates hits.
    ///
    /// # Errors
    ///
    /// `Validation` for an inverted window, `Storage`/`Unavailable` on backend failure.
    fn stats(&self, query: StatsQuery) -> BoxFuture<'_, Result<Vec<UriStats>>>;
}

/// Public uri of an event
#[must_use]
pub fn event_uri(event_id: EventId) -> String {
    format!("/events/{event_id}")
}

/// Extracts the event id from `/events/{id}`
#[must_use]
pub fn parse_event_uri(uri: &str) -> Option<EventId> {
    uri.strip_prefix("/events/")?.parse().ok().map(EventId::new)
}

/// Sums stats per event, ignoring uris that are not event pages
#[must_use]
pub fn views_by_event(stats: &[UriStats]) -> HashMap<EventId, u64> {
    let mut views = HashMap::new();
    for entry in stats {
        if let Some(event_id) = parse_event_uri(&entry.uri) {
            *views.entry(event_id).or_insert(0) += entry.hits;
        }
    }
    views
}
