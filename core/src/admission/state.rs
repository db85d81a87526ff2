//! Snapshot the admission reducer decides on.

use super::actions::SubmittedRequest;
use crate::error::DomainError;
use crate::types::{Event, ParticipationRequest, RequestId, RequestStatus, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One event and the requests a command needs to see
///
/// `confirmed` must be counted from the authoritative request table while the
/// event is locked. `requests` only has to contain the rows the command
/// touches: the caller's own request for a submission, the target for a
/// cancellation, the selected ids for moderation.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionState {
    /// The event being admitted to
    pub event: Event,
    /// Live `CONFIRMED` requests for the event
    pub confirmed: u32,
    /// Loaded requests, ordered by id
    pub requests: BTreeMap<RequestId, ParticipationRequest>,
    /// Requests accepted during this unit of work, awaiting ids
    pub submitted: Vec<SubmittedRequest>,
    /// Requests whose status changed, in processing order
    pub touched: Vec<RequestId>,
    /// Last error, if any
    pub last_error: Option<DomainError>,
}

impl AdmissionState {
    /// Creates a snapshot with no loaded requests
    #[must_use]
    pub const fn new(event: Event, confirmed: u32) -> Self {
        Self {
            event,
            confirmed,
            requests: BTreeMap::new(),
            submitted: Vec::new(),
            touched: Vec::new(),
            last_error: None,
        }
    }

    /// Adds loaded requests to the snapshot
    #[must_use]
    pub fn with_requests(mut self, requests: impl IntoIterator<Item = ParticipationRequest>) -> Self {
        self.requests
            .extend(requests.into_iter().map(|request| (request.id, request)));
        self
    }

    /// Whether `requester_id` already holds a request for this event
    #[must_use]
    pub fn has_request_from(&self, requester_id: UserId) -> bool {
        self.requests
            .values()
            .any(|r| r.event_id == self.event.id && r.requester_id == requester_id)
            || self.submitted.iter().any(|r| r.requester_id == requester_id)
    }

    /// Partitions touched requests by their new status, preserving order
    #[must_use]
    pub fn moderation_result(&self) -> ModerationResult {
        let mut result = ModerationResult::default();
        for request in self.touched.iter().filter_map(|id| self.requests.get(id)) {
            match request.status {
                RequestStatus::Confirmed => result.confirmed_requests.push(request.clone()),
                RequestStatus::Rejected => result.rejected_requests.push(request.clone()),
                RequestStatus::Pending | RequestStatus::Canceled => {},
            }
        }
        result
    }
}

/// Outcome of a bulk moderation, each list in ascending id order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationResult {
    /// Requests now `CONFIRMED`
    pub confirmed_requests: Vec<ParticipationRequest>,
    /// Requests now `REJECTED`, including spillover
    pub rejected_requests: Vec<ParticipationRequest>,
}
