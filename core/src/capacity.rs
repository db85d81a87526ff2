//! Capacity accounting.
//!
//! The confirmed count of an event is never stored: it is recomputed from the
//! live `CONFIRMED` requests inside the unit of work that holds the event's
//! lock, so it always equals the true count under concurrent writers.

use crate::types::{EventId, ParticipationRequest, RequestStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Participant limit of an event, `0` meaning unlimited
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantLimit(u32);

impl ParticipantLimit {
    /// No ceiling on confirmed requests
    pub const UNLIMITED: Self = Self(0);

    /// Creates a limit, `0` meaning unlimited
    #[must_use]
    pub const fn new(limit: u32) -> Self {
        Self(limit)
    }

    /// Raw limit value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Whether the event has no ceiling
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        self.0 == 0
    }

    /// Slots left given `confirmed` requests, `None` when unlimited
    #[must_use]
    pub const fn remaining(self, confirmed: u32) -> Option<u32> {
        if self.is_unlimited() {
            None
        } else {
            Some(self.0.saturating_sub(confirmed))
        }
    }

    /// Whether one more request can be confirmed
    #[must_use]
    pub const fn has_room(self, confirmed: u32) -> bool {
        match self.remaining(confirmed) {
            None => true,
            Some(left) => left > 0,
        }
    }
}

impl From<u32> for ParticipantLimit {
    fn from(limit: u32) -> Self {
        Self(limit)
    }
}

/// Counts `CONFIRMED` requests of `event_id` among `requests`.
#[must_use]
pub fn count_confirmed<'a, I>(event_id: EventId, requests: I) -> u32
where
    I: IntoIterator<Item = &'a ParticipationRequest>,
{
    let count = requests
        .into_iter()
        .filter(|request| request.event_id == event_id && request.status == RequestStatus::Confirmed)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Confirmed counts for a batch of events, produced by one grouped query
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmedCounts(HashMap<EventId, u32>);

impl ConfirmedCounts {
    /// Wraps grouped query results
    #[must_use]
    pub const fn new(counts: HashMap<EventId, u32>) -> Self {
        Self(counts)
    }

    /// Groups `requests` by event, counting `CONFIRMED` ones
    #[must_use]
    pub fn from_requests<'a, I>(requests: I) -> Self
    where
        I: IntoIterator<Item = &'a ParticipationRequest>,
    {
        let mut counts = HashMap::new();
        for request in requests {
            if request.status == RequestStatus::Confirmed {
                *counts.entry(request.event_id).or_insert(0) += 1;
            }
        }
        Self(counts)
    }

    /// Confirmed count of `event_id`, `0` when absent from the batch
    #[must_use]
    pub fn get(&self, event_id: EventId) -> u32 {
        self.0.get(&event_id).copied().unwrap_or(0)
    }
}
