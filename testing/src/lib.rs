//! # Eventhub Testing
//!
//! Testing utilities and helpers for eventhub.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - `ReducerTest`, a Given-When-Then harness for reducers
//! - `InMemoryStore` and `InMemoryViewStats` backends
//! - Fixtures that seed users, categories and events
//!
//! ## Example
//!
//! ```ignore
//! use eventhub_testing::{fixtures, test_clock, InMemoryStore};
//!
//! #[tokio::test]
//! async fn test_submit() {
//!     let store = InMemoryStore::with_clock(Arc::new(test_clock()));
//!     let world = fixtures::seed(&store).await;
//!     fixtures::publish(&store, world.event.id).await;
//!
//!     let ann = store.create_user(fixtures::new_user("ann")).await.unwrap();
//!     let request = store.submit_request(world.event.id, ann.id).await.unwrap();
//!     assert_eq!(request.status, RequestStatus::Pending);
//! }
//! ```

use chrono::{DateTime, Utc};
use eventhub_core::environment::Clock;

pub mod fixtures;
pub mod memory;
pub mod reducer_test;
pub mod views;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use eventhub_testing::mocks::FixedClock;
    /// use eventhub_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Property-based testing strategies for domain inputs.
pub mod properties {
    use eventhub_core::types::RequestStatus;
    use proptest::prelude::*;

    /// Any request status
    pub fn any_status() -> impl Strategy<Value = RequestStatus> {
        prop_oneof![
            Just(RequestStatus::Pending),
            Just(RequestStatus::Confirmed),
            Just(RequestStatus::Rejected),
            Just(RequestStatus::Canceled),
        ]
    }

    /// A moderation batch: `(limit, already confirmed, batch size)` with room left
    pub fn moderation_batch() -> impl Strategy<Value = (u32, u32, usize)> {
        (1u32..12).prop_flat_map(|limit| (Just(limit), 0..limit, 1usize..20))
    }
}

// Re-export commonly used items
pub use memory::InMemoryStore;
pub use mocks::{test_clock, FixedClock};
pub use reducer_test::{assertions, ReducerTest};
pub use views::InMemoryViewStats;
