//! Test data builders.

#![allow(clippy::expect_used)] // Fixtures fail loudly

use crate::mocks::test_clock;
use chrono::Duration;
use eventhub_core::environment::Clock;
use eventhub_core::publication::{Actor, EventUpdate};
use eventhub_core::store::{Directory, EventCatalog, EventHubStore};
use eventhub_core::types::{Category, Event, EventId, Location, NewEvent, NewUser, StateAction, User};

/// Seeded owner, category and pending event
#[derive(Clone, Debug)]
pub struct World {
    /// Event initiator
    pub owner: User,
    /// Category of the event
    pub category: Category,
    /// A `PENDING` event
    pub event: Event,
}

/// A valid user input with a unique-per-name email
#[must_use]
pub fn new_user(name: &str) -> NewUser {
    NewUser {
        name: name.to_string(),
        email: format!("{name}@example.com"),
    }
}

/// A valid event input one week after [`test_clock`]
#[must_use]
pub fn new_event(category: &Category, limit: u32, moderation: bool) -> NewEvent {
    NewEvent {
        title: "Rust meetup".to_string(),
        annotation: "An evening of talks about ownership".to_string(),
        description: "Three talks, pizza and a lot of borrow checking".to_string(),
        category_id: category.id,
        location: Location { lat: 55.75, lon: 37.62 },
        paid: Some(false),
        participant_limit: Some(limit),
        request_moderation: Some(moderation),
        event_date: test_clock().now() + Duration::days(7),
    }
}

/// Seeds an owner, a category and a pending event with limit 2 and moderation on
///
/// # Panics
///
/// Panics if the store refuses the seed data.
pub async fn seed(store: &dyn EventHubStore) -> World {
    seed_with(store, 2, true).await
}

/// Seeds an owner, a category and a pending event with the given settings
///
/// # Panics
///
/// Panics if the store refuses the seed data.
pub async fn seed_with(store: &dyn EventHubStore, limit: u32, moderation: bool) -> World {
    let owner = store
        .create_user(new_user("owner"))
        .await
        .expect("seed owner");
    let category = store
        .create_category(format!("category-{}", owner.id))
        .await
        .expect("seed category");
    let event = store
        .create_event(owner.id, new_event(&category, limit, moderation))
        .await
        .expect("seed event");
    World { owner, category, event }
}

/// Publishes an event as an administrator
///
/// # Panics
///
/// Panics if the event cannot be published.
pub async fn publish(store: &dyn EventHubStore, event_id: EventId) -> Event {
    store
        .update_event(
            event_id,
            Actor::Admin,
            EventUpdate {
                state_action: Some(StateAction::PublishEvent),
                ..EventUpdate::default()
            },
        )
        .await
        .expect("publish event")
}

/// Registers `count` participants named `participant-{n}`
///
/// # Panics
///
/// Panics if a user cannot be created.
pub async fn participants(store: &dyn EventHubStore, count: usize) -> Vec<User> {
    let mut users = Vec::with_capacity(count);
    for n in 0..count {
        users.push(
            store
                .create_user(new_user(&format!("participant-{n}")))
                .await
                .expect("seed participant"),
        );
    }
    users
}
