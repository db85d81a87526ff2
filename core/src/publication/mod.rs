//! Event publication.
//!
//! Owners and administrators update events through the same field patch; the
//! [`Actor`] decides which lifecycle transitions are legal.

pub mod patch;
pub mod reducer;

pub use patch::{Actor, EventPatch, EventUpdate, LocationPatch};
pub use reducer::{
    PublicationAction, PublicationEnvironment, PublicationReducer, PublicationState,
};
