//! Business metrics for the event hub.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `eventhub_requests_submitted_total{status}` - Requests created, by initial status
//! - `eventhub_requests_canceled_total` - Requests canceled by their participant
//! - `eventhub_moderation_decisions_total{status}` - Requests decided in bulk, by outcome
//! - `eventhub_admission_rejections_total{reason}` - Admission commands refused with a conflict
//! - `eventhub_events_published_total` - Events published by an administrator
//! - `eventhub_storage_errors_total{operation}` - Database failures, counted by the store
//! - `eventhub_stats_hits_recorded_total` - Hits accepted by the view counter

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use eventhub_core::admission::ModerationResult;
use eventhub_core::types::ParticipationRequest;
use eventhub_core::DomainError;
use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;

/// Register all metric descriptions.
pub fn register_business_metrics() {
    describe_counter!(
        "eventhub_requests_submitted_total",
        "Participation requests created, by initial status (pending, confirmed)"
    );
    describe_counter!(
        "eventhub_requests_canceled_total",
        "Participation requests canceled by their participant"
    );
    describe_counter!(
        "eventhub_moderation_decisions_total",
        "Requests confirmed or rejected through bulk moderation"
    );
    describe_counter!(
        "eventhub_admission_rejections_total",
        "Admission commands refused with a conflict, by reason"
    );
    describe_counter!(
        "eventhub_events_published_total",
        "Events published by an administrator"
    );
    describe_counter!(
        "eventhub_storage_errors_total",
        "Database failures, by store operation"
    );
    describe_counter!(
        "eventhub_stats_hits_recorded_total",
        "Hits stored by the view-counting backend"
    );

    tracing::info!("Business metrics registered");
}

/// Installs the Prometheus recorder and registers descriptions.
///
/// Returns `None` when a recorder is already installed.
#[must_use]
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            register_business_metrics();
            Some(handle)
        },
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder not installed");
            None
        },
    }
}

/// `GET /metrics`
pub async fn render(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Record a newly submitted request.
pub fn record_request_submitted(request: &ParticipationRequest) {
    let status = request.status.as_str().to_lowercase();
    metrics::counter!("eventhub_requests_submitted_total", "status" => status).increment(1);
}

/// Record a cancellation.
pub fn record_request_canceled() {
    metrics::counter!("eventhub_requests_canceled_total").increment(1);
}

/// Record the outcome of a bulk decision.
pub fn record_moderation(result: &ModerationResult) {
    let confirmed = result.confirmed_requests.len() as u64;
    let rejected = result.rejected_requests.len() as u64;
    metrics::counter!("eventhub_moderation_decisions_total", "status" => "confirmed").increment(confirmed);
    metrics::counter!("eventhub_moderation_decisions_total", "status" => "rejected").increment(rejected);
}

/// Record an admission command refused with a conflict.
///
/// Storage failures are counted where they happen, in the store.
pub fn record_admission_error(error: &DomainError) {
    if let DomainError::Conflict(reason) = error {
        metrics::counter!("eventhub_admission_rejections_total", "reason" => reason.label())
            .increment(1);
    }
}

/// Record a hit accepted by the view-counting backend.
pub fn record_hit_recorded() {
    metrics::counter!("eventhub_stats_hits_recorded_total").increment(1);
}

/// Record an administrator publishing an event.
pub fn record_event_published() {
    metrics::counter!("eventhub_events_published_total").increment(1);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use eventhub_core::types::EventId;
    use eventhub_core::ConflictReason;

    fn rendered(f: impl FnOnce()) -> String {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, f);
        handle.render()
    }

    #[test]
    fn test_conflicts_count_by_reason() {
        let output = rendered(|| {
            record_admission_error(&DomainError::from(ConflictReason::CapacityExceeded {
                event_id: EventId::new(1),
            }));
        });
        assert!(output.contains(r#"eventhub_admission_rejections_total{reason="capacity_exceeded"} 1"#));
    }

    #[test]
    fn test_storage_failures_are_left_to_the_store() {
        let output = rendered(|| record_admission_error(&DomainError::storage("pool closed")));
        assert!(!output.contains("eventhub_storage_errors_total"));
        assert!(!output.contains("eventhub_admission_rejections_total"));
    }
}
