//! Read side of the event endpoints.
//!
//! Listings are enriched in a fixed number of round trips per page: one
//! grouped confirmed-count query, one user lookup, one lookup per distinct
//! category and, on public paths, one stats query. Public reads also report a
//! hit to the view counter without waiting for it.

use crate::config::Settings;
use crate::dto::{CompilationDto, EventFull, EventShort, EventSort, UserShort};
use crate::metrics;
use eventhub_core::environment::Clock;
use eventhub_core::stats::{event_uri, views_by_event, NewHit, StatsQuery, ViewStats};
use eventhub_core::store::{EventFilter, EventHubStore, EventOrder, PageRequest};
use eventhub_core::types::{
    Category, CategoryId, Compilation, CompilationId, Event, EventId, EventState, UserId,
};
use eventhub_core::{DomainError, Entity, Result};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;

/// Event reads with confirmed counts and views attached
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventHubStore>,
    stats: Arc<dyn ViewStats>,
    clock: Arc<dyn Clock>,
    settings: Settings,
}

impl EventService {
    /// Creates a new `EventService`
    #[must_use]
    pub fn new(
        store: Arc<dyn EventHubStore>,
        stats: Arc<dyn ViewStats>,
        clock: Arc<dyn Clock>,
        settings: Settings,
    ) -> Self {
        Self { store, stats, clock, settings }
    }

    /// Public search over published events.
    ///
    /// Without a date range only upcoming events are listed. `VIEWS` ordering
    /// needs every match's view count, so the page is cut after sorting.
    ///
    /// # Errors
    ///
    /// `Validation` for an inverted range, `Storage` on backend failure.
    #[tracing::instrument(skip(self, filter), fields(text = ?filter.text))]
    pub async fn public_search(
        &self,
        mut filter: EventFilter,
        sort: Option<EventSort>,
        page: PageRequest,
    ) -> Result<Vec<EventShort>> {
        filter.states = vec![EventState::Published];
        if filter.range_start.is_none() && filter.range_end.is_none() {
            filter.range_start = Some(self.clock.now());
        }

        let events = match sort {
            Some(EventSort::Views) => {
                filter.order = EventOrder::Id;
                let all = self.store.list_events(filter, PageRequest::new(0, u32::MAX)?).await?;
                let mut enriched = self.enrich(all, true).await?;
                enriched.sort_by(|a, b| b.views.cmp(&a.views).then(a.id.cmp(&b.id)));
                page.slice(enriched)
            },
            Some(EventSort::EventDate) => {
                filter.order = EventOrder::EventDate;
                let events = self.store.list_events(filter, page).await?;
                self.enrich(events, true).await?
            },
            None => {
                filter.order = EventOrder::Id;
                let events = self.store.list_events(filter, page).await?;
                self.enrich(events, true).await?
            },
        };

        tracing::debug!(count = events.len(), "Public search");
        Ok(events.into_iter().map(EventShort::from).collect())
    }

    /// A published event by id.
    ///
    /// # Errors
    ///
    /// `NotFound` when the event is absent or not published.
    pub async fn public_event(&self, id: EventId) -> Result<EventFull> {
        let event = self.store.get_event(id).await?;
        if !event.is_published() {
            return Err(DomainError::not_found(Entity::Event, id));
        }
        self.single(event, true).await
    }

    /// Administrator search, ascending id.
    ///
    /// # Errors
    ///
    /// `Validation` for an inverted range, `Storage` on backend failure.
    pub async fn admin_search(&self, mut filter: EventFilter, page: PageRequest) -> Result<Vec<EventFull>> {
        filter.order = EventOrder::Id;
        let events = self.store.list_events(filter, page).await?;
        self.enrich(events, false).await
    }

    /// Events created by `owner_id`, ascending id.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    pub async fn owner_events(&self, owner_id: UserId, page: PageRequest) -> Result<Vec<EventShort>> {
        self.store.get_user(owner_id).await?;
        let filter = EventFilter {
            initiators: vec![owner_id],
            ..EventFilter::default()
        };
        let events = self.store.list_events(filter, page).await?;
        Ok(self
            .enrich(events, false)
            .await?
            .into_iter()
            .map(EventShort::from)
            .collect())
    }

    /// One of the owner's events.
    ///
    /// # Errors
    ///
    /// `NotFound` when the event is absent or owned by someone else.
    pub async fn owner_event(&self, owner_id: UserId, id: EventId) -> Result<EventFull> {
        self.store.get_user(owner_id).await?;
        let event = self.store.get_event(id).await?;
        if !event.is_owned_by(owner_id) {
            return Err(DomainError::not_found(Entity::Event, id));
        }
        self.single(event, false).await
    }

    /// Public compilation listing, ascending id.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    pub async fn compilations(
        &self,
        pinned: Option<bool>,
        page: PageRequest,
    ) -> Result<Vec<CompilationDto>> {
        let compilations = self.store.list_compilations(pinned, page).await?;
        self.present(compilations, true).await
    }

    /// A compilation by id, with views on its events.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn compilation(&self, id: CompilationId) -> Result<CompilationDto> {
        let compilation = self.store.get_compilation(id).await?;
        self.present_one(compilation, true).await
    }

    /// Expands one compilation, typically right after a write.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    pub async fn present_one(&self, compilation: Compilation, with_views: bool) -> Result<CompilationDto> {
        let id = compilation.id;
        self.present(vec![compilation], with_views)
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found(Entity::Compilation, id))
    }

    /// Expands member ids into event summaries, loading every member of the
    /// batch with one search.
    async fn present(
        &self,
        compilations: Vec<Compilation>,
        with_views: bool,
    ) -> Result<Vec<CompilationDto>> {
        let ids: BTreeSet<EventId> = compilations
            .iter()
            .flat_map(|c| c.event_ids.iter().copied())
            .collect();
        let mut events: HashMap<EventId, EventShort> = HashMap::with_capacity(ids.len());
        if !ids.is_empty() {
            let size = u32::try_from(ids.len()).map_err(DomainError::storage)?;
            let filter = EventFilter { ids: ids.into_iter().collect(), ..EventFilter::default() };
            let members = self.store.list_events(filter, PageRequest::new(0, size)?).await?;
            for event in self.enrich(members, with_views).await? {
                events.insert(event.id, EventShort::from(event));
            }
        }

        Ok(compilations
            .into_iter()
            .map(|c| CompilationDto {
                id: c.id,
                title: c.title,
                pinned: c.pinned,
                events: c.event_ids.iter().filter_map(|id| events.get(id).cloned()).collect(),
            })
            .collect())
    }

    /// Enriches one event, typically right after a write.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure.
    pub async fn single(&self, event: Event, with_views: bool) -> Result<EventFull> {
        let id = event.id;
        self.enrich(vec![event], with_views)
            .await?
            .pop()
            .ok_or_else(|| DomainError::not_found(Entity::Event, id))
    }

    /// Attaches category, initiator, confirmed count and optionally views.
    ///
    /// # Errors
    ///
    /// `Storage` on backend failure, `NotFound` if a referenced record vanished.
    pub async fn enrich(&self, events: Vec<Event>, with_views: bool) -> Result<Vec<EventFull>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self
            .store
            .confirmed_counts(events.iter().map(|e| e.id).collect())
            .await?;
        let initiators = self.initiators(&events).await?;
        let categories = self.categories(&events).await?;
        let views = if with_views {
            Some(self.views(&events).await)
        } else {
            None
        };

        events
            .into_iter()
            .map(|event| {
                let category = categories
                    .get(&event.category_id)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(Entity::Category, event.category_id))?;
                let initiator = initiators
                    .get(&event.initiator_id)
                    .cloned()
                    .ok_or_else(|| DomainError::not_found(Entity::User, event.initiator_id))?;
                let confirmed = counts.get(event.id);
                let event_views = views
                    .as_ref()
                    .map(|views| views.get(&event.id).copied().unwrap_or(0));
                Ok(EventFull::new(event, category, initiator, confirmed, event_views))
            })
            .collect()
    }

    /// Reports a visit to `uri`; failures are logged only.
    pub fn record_hit(&self, uri: String, ip: IpAddr) {
        let hit = NewHit {
            app: self.settings.app_name.clone(),
            uri,
            ip: ip.to_string(),
            timestamp: self.clock.now(),
        };
        let stats = Arc::clone(&self.stats);
        tokio::spawn(async move {
            let uri = hit.uri.clone();
            match stats.record_hit(hit).await {
                Ok(_) => metrics::record_hit_recorded(),
                Err(e) => tracing::warn!(error = %e, uri = %uri, "Failed to record hit"),
            }
        });
    }

    async fn initiators(&self, events: &[Event]) -> Result<HashMap<UserId, UserShort>> {
        let ids: BTreeSet<UserId> = events.iter().map(|e| e.initiator_id).collect();
        let size = u32::try_from(ids.len()).map_err(DomainError::storage)?;
        let users = self
            .store
            .list_users(ids.into_iter().collect(), PageRequest::new(0, size)?)
            .await?;
        Ok(users.into_iter().map(|u| (u.id, UserShort::from(u))).collect())
    }

    async fn categories(&self, events: &[Event]) -> Result<HashMap<CategoryId, Category>> {
        let ids: BTreeSet<CategoryId> = events.iter().map(|e| e.category_id).collect();
        let mut categories = HashMap::with_capacity(ids.len());
        for id in ids {
            categories.insert(id, self.store.get_category(id).await?);
        }
        Ok(categories)
    }

    /// Unique visitors per event since the oldest event was created.
    ///
    /// An unreachable view counter yields zero views rather than failing the read.
    async fn views(&self, events: &[Event]) -> HashMap<EventId, u64> {
        let Some(start) = events.iter().map(|e| e.created_on).min() else {
            return HashMap::new();
        };
        let query = StatsQuery {
            start,
            end: self.clock.now(),
            uris: events.iter().map(|e| event_uri(e.id)).collect(),
            unique: true,
        };
        match self.stats.stats(query).await {
            Ok(stats) => views_by_event(&stats),
            Err(e) => {
                tracing::warn!(error = %e, "View counts unavailable");
                HashMap::new()
            },
        }
    }
}
