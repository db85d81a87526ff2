//! Field patches shared by owner and administrator updates.

use crate::error::Result;
use crate::types::{
    timestamp, validate_event_date, validate_text, CategoryId, Event, Location, StateAction,
    UserId, ANNOTATION_LEN, DESCRIPTION_LEN, TITLE_LEN,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Who is updating an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Actor {
    /// The event's initiator, or someone claiming to be
    Owner(UserId),
    /// An administrator
    Admin,
}

/// Location change, applied only when both coordinates are present
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationPatch {
    /// Latitude
    pub lat: Option<f64>,
    /// Longitude
    pub lon: Option<f64>,
}

impl LocationPatch {
    fn complete(self) -> Option<Location> {
        Some(Location { lat: self.lat?, lon: self.lon? })
    }
}

/// Optional event fields; absent or blank values leave the event unchanged
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventPatch {
    /// New title
    pub title: Option<String>,
    /// New annotation
    pub annotation: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New category, must exist
    #[serde(rename = "category")]
    pub category_id: Option<CategoryId>,
    /// New location
    pub location: Option<LocationPatch>,
    /// New paid flag
    pub paid: Option<bool>,
    /// New moderation flag
    pub request_moderation: Option<bool>,
    /// New participant limit
    pub participant_limit: Option<u32>,
    /// New event date
    #[serde(with = "timestamp::option")]
    pub event_date: Option<DateTime<Utc>>,
}

fn non_blank(value: Option<&String>) -> Option<&String> {
    value.filter(|v| !v.trim().is_empty())
}

impl EventPatch {
    /// Validates the fields that will be applied.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DomainError::Validation`] for out-of-bounds text or an
    /// event date closer than `lead` to `now`.
    pub fn validate(&self, now: DateTime<Utc>, lead: Duration) -> Result<()> {
        if let Some(title) = non_blank(self.title.as_ref()) {
            validate_text("title", title, TITLE_LEN)?;
        }
        if let Some(annotation) = non_blank(self.annotation.as_ref()) {
            validate_text("annotation", annotation, ANNOTATION_LEN)?;
        }
        if let Some(description) = non_blank(self.description.as_ref()) {
            validate_text("description", description, DESCRIPTION_LEN)?;
        }
        if let Some(event_date) = self.event_date {
            validate_event_date(event_date, now, lead)?;
        }
        Ok(())
    }

    /// Copies present fields onto `event`.
    pub fn apply_to(&self, event: &mut Event) {
        if let Some(title) = non_blank(self.title.as_ref()) {
            event.title.clone_from(title);
        }
        if let Some(annotation) = non_blank(self.annotation.as_ref()) {
            event.annotation.clone_from(annotation);
        }
        if let Some(description) = non_blank(self.description.as_ref()) {
            event.description.clone_from(description);
        }
        if let Some(category_id) = self.category_id {
            event.category_id = category_id;
        }
        if let Some(location) = self.location.and_then(LocationPatch::complete) {
            event.location = location;
        }
        if let Some(paid) = self.paid {
            event.paid = paid;
        }
        if let Some(moderation) = self.request_moderation {
            event.request_moderation = moderation;
        }
        if let Some(limit) = self.participant_limit {
            event.participant_limit = limit;
        }
        if let Some(event_date) = self.event_date {
            event.event_date = event_date;
        }
    }
}

/// Body of an event update request
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventUpdate {
    /// Field changes
    #[serde(flatten)]
    pub patch: EventPatch,
    /// Lifecycle action
    #[serde(default)]
    pub state_action: Option<StateAction>,
    /// Administrator's comment, stored on rejection
    #[serde(default)]
    pub moderation_comment: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::types::{EventId, EventState};

    fn event() -> Event {
        let now = Utc::now();
        Event {
            id: EventId::new(1),
            title: "Original title".to_string(),
            annotation: "Original annotation text".to_string(),
            description: "Original description text".to_string(),
            category_id: CategoryId::new(1),
            initiator_id: UserId::new(1),
            location: Location { lat: 1.0, lon: 2.0 },
            paid: false,
            participant_limit: 10,
            request_moderation: true,
            event_date: now + Duration::days(3),
            created_on: now,
            published_on: None,
            state: EventState::Pending,
            moderation_comment: None,
        }
    }

    #[test]
    fn test_blank_strings_are_ignored() {
        let mut target = event();
        let patch = EventPatch {
            title: Some("   ".to_string()),
            description: Some("A brand new description".to_string()),
            ..EventPatch::default()
        };

        patch.apply_to(&mut target);

        assert_eq!(target.title, "Original title");
        assert_eq!(target.description, "A brand new description");
    }

    #[test]
    fn test_location_needs_both_coordinates() {
        let mut target = event();
        EventPatch {
            location: Some(LocationPatch { lat: Some(9.0), lon: None }),
            ..EventPatch::default()
        }
        .apply_to(&mut target);
        assert_eq!(target.location, Location { lat: 1.0, lon: 2.0 });

        EventPatch {
            location: Some(LocationPatch { lat: Some(9.0), lon: Some(8.0) }),
            ..EventPatch::default()
        }
        .apply_to(&mut target);
        assert_eq!(target.location, Location { lat: 9.0, lon: 8.0 });
    }

    #[test]
    fn test_update_body_is_flat() {
        let update: EventUpdate = serde_json::from_str(
            r#"{"title":"New title","participantLimit":5,"stateAction":"PUBLISH_EVENT","eventDate":"2030-01-01 10:00:00"}"#,
        )
        .unwrap();

        assert_eq!(update.patch.title.as_deref(), Some("New title"));
        assert_eq!(update.patch.participant_limit, Some(5));
        assert_eq!(update.state_action, Some(StateAction::PublishEvent));
        assert!(update.patch.event_date.is_some());
    }
}
