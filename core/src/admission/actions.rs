//! Commands and facts of the admission reducer.

use crate::error::DomainError;
use crate::types::{EventId, RequestId, RequestStatus, UserId};
use chrono::{DateTime, Utc};

/// A request accepted by the reducer, before the store assigns its id
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedRequest {
    /// Target event
    pub event_id: EventId,
    /// Participant
    pub requester_id: UserId,
    /// `PENDING`, or `CONFIRMED` when admission is automatic
    pub status: RequestStatus,
    /// Submission time
    pub created: DateTime<Utc>,
}

/// Actions for request admission
///
/// Commands are issued by participants and owners; facts describe the rows
/// a store must write.
#[derive(Clone, Debug, PartialEq)]
pub enum AdmissionAction {
    // Commands
    /// Participant asks to join the event
    SubmitRequest {
        /// Participant
        requester_id: UserId,
    },

    /// Participant withdraws their request
    CancelRequest {
        /// Request to cancel
        request_id: RequestId,
        /// Caller, must be the original requester
        requester_id: UserId,
    },

    /// Owner confirms or rejects pending requests in bulk
    ModerateRequests {
        /// Caller, must be the event's initiator
        owner_id: UserId,
        /// Requests to decide on
        request_ids: Vec<RequestId>,
        /// `CONFIRMED` or `REJECTED`
        status: RequestStatus,
    },

    // Facts
    /// A new request row must be inserted
    RequestSubmitted(SubmittedRequest),

    /// An existing request changed status
    RequestStatusChanged {
        /// Request ID
        request_id: RequestId,
        /// Status before the change
        from: RequestStatus,
        /// Status after the change
        to: RequestStatus,
    },

    /// The command was refused
    AdmissionRejected {
        /// Why
        error: DomainError,
    },
}

impl AdmissionAction {
    /// Whether this action is a fact to persist rather than a command
    #[must_use]
    pub const fn is_fact(&self) -> bool {
        matches!(self, Self::RequestSubmitted(_) | Self::RequestStatusChanged { .. })
    }
}
