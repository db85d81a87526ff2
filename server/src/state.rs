//! Application state for the event hub HTTP server.

use crate::config::Settings;
use crate::service::EventService;
use axum::extract::FromRef;
use eventhub_core::environment::Clock;
use eventhub_core::stats::ViewStats;
use eventhub_core::store::EventHubStore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned (cheaply via Arc) for each request.
#[derive(Clone)]
pub struct AppState {
    /// Users, categories, events and requests
    pub store: Arc<dyn EventHubStore>,
    /// Enriched event reads
    pub events: EventService,
    /// Page size and lead times
    pub settings: Settings,
    /// Prometheus handle, when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn EventHubStore>,
        stats: Arc<dyn ViewStats>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        let events = EventService::new(Arc::clone(&store), stats, clock, settings.clone());
        Self {
            store,
            events,
            settings,
            metrics: None,
        }
    }

    /// Serve `/metrics` from this handle
    #[must_use]
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}

impl FromRef<AppState> for Arc<dyn EventHubStore> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.store)
    }
}

impl FromRef<AppState> for EventService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.events.clone()
    }
}
