//! Request admission.
//!
//! Decides how participation requests are created, canceled and moderated in
//! bulk against an event's participant limit and moderation flag.
//!
//! # Unit of work
//!
//! ```text
//! store: BEGIN → lock event row → load AdmissionState (recount CONFIRMED)
//!                 ↓
//! AdmissionReducer::execute(command) → facts (or DomainError)
//!                 ↓
//! store: write facts in order → COMMIT
//! ```
//!
//! The reducer never touches storage. Stores must hold the event lock from the
//! moment the confirmed count is read until the facts are written, otherwise
//! two concurrent submissions could both see the last free slot.

pub mod actions;
pub mod environment;
pub mod reducer;
pub mod state;
#[cfg(test)]
mod tests;

pub use actions::{AdmissionAction, SubmittedRequest};
pub use environment::AdmissionEnvironment;
pub use reducer::AdmissionReducer;
pub use state::{AdmissionState, ModerationResult};
