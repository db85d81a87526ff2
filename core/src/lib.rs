//! # Eventhub Core
//!
//! Domain types, reducers and store traits for managing public events with a
//! finite participant limit and moderated registration.
//!
//! The crate follows a "functional core, imperative shell" split: all
//! admission and publication decisions are made by pure reducers operating on
//! a snapshot of an event, while stores (in-memory or `PostgreSQL`) own the
//! transaction that loads the snapshot, runs the reducer and persists the
//! resulting facts.
//!
//! ## Core Concepts
//!
//! - **State**: A locked snapshot of one event and the requests relevant to a command
//! - **Action**: Commands (submit, cancel, moderate, update) and the facts they produce
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Facts to persist inside the surrounding unit of work
//! - **Environment**: Injected dependencies (clock, lead-time settings)
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_core::admission::{AdmissionAction, AdmissionReducer, AdmissionState};
//!
//! let mut state = AdmissionState::new(event, confirmed).with_requests(existing);
//! let facts = AdmissionReducer::new().execute(
//!     &mut state,
//!     AdmissionAction::SubmitRequest { requester_id },
//!     &env,
//! )?;
//! // persist `facts` inside the same transaction that locked the event row
//! ```

pub mod admission;
pub mod capacity;
pub mod error;
pub mod publication;
pub mod stats;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use error::{ConflictReason, DomainError, Entity, Result};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{smallvec, SmallVec};

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for business logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The domain state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for AdmissionReducer {
    ///     type State = AdmissionState;
    ///     type Action = AdmissionAction;
    ///     type Environment = AdmissionEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut AdmissionState,
    ///         action: AdmissionAction,
    ///         env: &AdmissionEnvironment,
    ///     ) -> SmallVec<[Effect<AdmissionAction>; 4]> {
    ///         match action {
    ///             AdmissionAction::SubmitRequest { requester_id } => {
    ///                 // Business logic here
    ///                 SmallVec::new()
    ///             }
    ///             _ => SmallVec::new(),
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe writes to be performed by the store that ran the reducer.
/// They are values (not execution): the store decides how a fact is written
/// (a row insert, an update, a counter bump) but must write all of them in
/// the order given and inside the transaction that produced the snapshot.
pub mod effect {
    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type whose fact variants are persisted
    #[derive(Debug, Clone, PartialEq)]
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Persist one fact
        Persist(Action),

        /// Run effects sequentially, in order
        Sequential(Vec<Effect<Action>>),
    }

    impl<Action> Effect<Action> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Flatten this effect into the facts it persists, preserving order.
        #[must_use]
        pub fn into_persisted(self) -> Vec<Action> {
            let mut facts = Vec::new();
            self.collect_into(&mut facts);
            facts
        }

        fn collect_into(self, facts: &mut Vec<Action>) {
            match self {
                Effect::None => {},
                Effect::Persist(action) => facts.push(action),
                Effect::Sequential(effects) => {
                    for effect in effects {
                        effect.collect_into(facts);
                    }
                },
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// via the Environment parameter.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(Utc::now());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock backed by [`Utc::now`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
