//! In-memory store for tests and local runs.
//!
//! Capacity-affecting operations take a per-event async mutex for the whole
//! read-decide-write cycle, mirroring the row lock the `PostgreSQL` store
//! takes with `SELECT ... FOR UPDATE`.

use eventhub_core::admission::{
    AdmissionAction, AdmissionEnvironment, AdmissionReducer, AdmissionState, ModerationResult,
};
use eventhub_core::capacity::{count_confirmed, ConfirmedCounts};
use eventhub_core::environment::Clock;
use eventhub_core::publication::{
    Actor, EventUpdate, PublicationAction, PublicationEnvironment, PublicationReducer,
    PublicationState,
};
use eventhub_core::store::{
    AdmissionStore, CompilationStore, Directory, EventCatalog, EventFilter, EventOrder,
    PageRequest, StatusDecision,
};
use eventhub_core::types::{
    validate_category_name, Category, CategoryId, Compilation, CompilationId, CompilationPatch,
    Event, EventId, NewCompilation, NewEvent, NewUser, ParticipationRequest, RequestId, User,
    UserId,
};
use eventhub_core::{ConflictReason, DomainError, Entity, Result};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    events: BTreeMap<EventId, Event>,
    requests: BTreeMap<RequestId, ParticipationRequest>,
    compilations: BTreeMap<CompilationId, Compilation>,
    last_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, id: UserId) -> Result<&User> {
        self.users
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::User, id))
    }

    fn category(&self, id: CategoryId) -> Result<&Category> {
        self.categories
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Category, id))
    }

    fn event(&self, id: EventId) -> Result<&Event> {
        self.events
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Event, id))
    }

    fn compilation(&self, id: CompilationId) -> Result<&Compilation> {
        self.compilations
            .get(&id)
            .ok_or_else(|| DomainError::not_found(Entity::Compilation, id))
    }

    fn ensure_events_exist(&self, ids: &[EventId]) -> Result<()> {
        match ids.iter().find(|id| !self.events.contains_key(id)) {
            Some(missing) => Err(DomainError::not_found(Entity::Event, *missing)),
            None => Ok(()),
        }
    }

    fn ensure_unique_compilation(&self, title: &str, except: Option<CompilationId>) -> Result<()> {
        let taken = self
            .compilations
            .values()
            .any(|c| c.title == title && Some(c.id) != except);
        if taken {
            return Err(ConflictReason::DuplicateName(title.to_string()).into());
        }
        Ok(())
    }

    fn confirmed(&self, event_id: EventId) -> u32 {
        count_confirmed(event_id, self.requests.values())
    }

    fn ensure_unique_category(&self, name: &str, except: Option<CategoryId>) -> Result<()> {
        let taken = self
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except);
        if taken {
            return Err(ConflictReason::DuplicateName(name.to_string()).into());
        }
        Ok(())
    }

    /// Writes one admission fact, returning the row it produced or changed
    fn apply_admission(&mut self, fact: AdmissionAction) -> Option<ParticipationRequest> {
        match fact {
            AdmissionAction::RequestSubmitted(submitted) => {
                let request = ParticipationRequest {
                    id: RequestId::new(self.next_id()),
                    event_id: submitted.event_id,
                    requester_id: submitted.requester_id,
                    status: submitted.status,
                    created: submitted.created,
                };
                self.requests.insert(request.id, request.clone());
                Some(request)
            },
            AdmissionAction::RequestStatusChanged { request_id, to, .. } => {
                let request = self.requests.get_mut(&request_id)?;
                request.status = to;
                Some(request.clone())
            },
            _ => None,
        }
    }
}

/// Thread-safe in-memory implementation of every store trait
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    event_locks: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
    admission: AdmissionEnvironment,
    publication: PublicationEnvironment,
}

impl InMemoryStore {
    /// Creates an empty store
    #[must_use]
    pub fn new(admission: AdmissionEnvironment, publication: PublicationEnvironment) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            event_locks: Mutex::new(HashMap::new()),
            admission,
            publication,
        }
    }

    /// Creates an empty store with default lead times (owner 2h, admin 1h)
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            AdmissionEnvironment::new(Arc::clone(&clock)),
            PublicationEnvironment::new(
                clock,
                chrono::Duration::hours(2),
                chrono::Duration::hours(1),
            ),
        )
    }

    async fn event_lock(&self, event_id: EventId) -> Arc<Mutex<()>> {
        let mut locks = self.event_locks.lock().await;
        Arc::clone(locks.entry(event_id).or_default())
    }
}

impl Directory for InMemoryStore {
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            user.validate()?;
            let mut tables = self.tables.write().await;
            if tables.users.values().any(|u| u.email == user.email) {
                return Err(ConflictReason::DuplicateEmail(user.email).into());
            }
            let created = User {
                id: UserId::new(tables.next_id()),
                name: user.name,
                email: user.email,
            };
            tables.users.insert(created.id, created.clone());
            Ok(created)
        })
    }

    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move { self.tables.read().await.user(id).cloned() })
    }

    fn list_users(&self, ids: Vec<UserId>, page: PageRequest) -> BoxFuture<'_, Result<Vec<User>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let users = tables
                .users
                .values()
                .filter(|u| ids.is_empty() || ids.contains(&u.id))
                .cloned();
            Ok(page.slice(users))
        })
    }

    fn delete_user(&self, id: UserId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let owned: Vec<EventId> = {
                let tables = self.tables.read().await;
                tables.user(id)?;
                tables
                    .events
                    .values()
                    .filter(|e| e.initiator_id == id)
                    .map(|e| e.id)
                    .collect()
            };

            // Ascending id order, so concurrent deletions cannot deadlock
            let mut guards = Vec::with_capacity(owned.len());
            for event_id in owned {
                guards.push(self.event_lock(event_id).await.lock_owned().await);
            }

            let mut tables = self.tables.write().await;
            tables.user(id)?;
            tables.users.remove(&id);
            tables.events.retain(|_, e| e.initiator_id != id);
            let Tables { events, requests, compilations, .. } = &mut *tables;
            requests.retain(|_, r| r.requester_id != id && events.contains_key(&r.event_id));
            for compilation in compilations.values_mut() {
                compilation.event_ids.retain(|e| events.contains_key(e));
            }
            Ok(())
        })
    }

    fn create_category(&self, name: String) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move {
            validate_category_name(&name)?;
            let mut tables = self.tables.write().await;
            tables.ensure_unique_category(&name, None)?;
            let category = Category { id: CategoryId::new(tables.next_id()), name };
            tables.categories.insert(category.id, category.clone());
            Ok(category)
        })
    }

    fn rename_category(&self, id: CategoryId, name: String) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move {
            validate_category_name(&name)?;
            let mut tables = self.tables.write().await;
            tables.category(id)?;
            tables.ensure_unique_category(&name, Some(id))?;
            let category = Category { id, name };
            tables.categories.insert(id, category.clone());
            Ok(category)
        })
    }

    fn delete_category(&self, id: CategoryId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            tables.category(id)?;
            if tables.events.values().any(|e| e.category_id == id) {
                return Err(ConflictReason::CategoryInUse(id).into());
            }
            tables.categories.remove(&id);
            Ok(())
        })
    }

    fn get_category(&self, id: CategoryId) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move { self.tables.read().await.category(id).cloned() })
    }

    fn list_categories(&self, page: PageRequest) -> BoxFuture<'_, Result<Vec<Category>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(page.slice(tables.categories.values().cloned()))
        })
    }
}

impl EventCatalog for InMemoryStore {
    fn create_event(&self, initiator_id: UserId, input: NewEvent) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            let now = self.publication.clock.now();
            let mut tables = self.tables.write().await;
            tables.user(initiator_id)?;
            tables.category(input.category_id)?;
            input.validate(now, self.publication.owner_min_lead)?;

            let id = EventId::new(tables.next_id());
            let event = input.into_event(id, initiator_id, now);
            tables.events.insert(id, event.clone());
            Ok(event)
        })
    }

    fn get_event(&self, id: EventId) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move { self.tables.read().await.event(id).cloned() })
    }

    fn list_events(&self, filter: EventFilter, page: PageRequest) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(async move {
            filter.validate()?;
            let tables = self.tables.read().await;
            let mut events: Vec<&Event> = tables
                .events
                .values()
                .filter(|e| filter.matches(e, tables.confirmed(e.id)))
                .collect();
            if filter.order == EventOrder::EventDate {
                events.sort_by_key(|e| (e.event_date, e.id));
            }
            Ok(page.slice(events.into_iter().cloned()))
        })
    }

    fn update_event(
        &self,
        id: EventId,
        actor: Actor,
        update: EventUpdate,
    ) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            let lock = self.event_lock(id).await;
            let _guard = lock.lock().await;

            let mut state = {
                let tables = self.tables.read().await;
                if let Actor::Owner(user_id) = actor {
                    tables.user(user_id)?;
                }
                let known_category = update
                    .patch
                    .category_id
                    .filter(|c| tables.categories.contains_key(c));
                PublicationState::new(tables.event(id)?.clone(), tables.confirmed(id))
                    .with_known_category(known_category)
            };

            let facts = PublicationReducer::new().execute(
                &mut state,
                PublicationAction::UpdateEvent { actor, update },
                &self.publication,
            )?;

            let mut tables = self.tables.write().await;
            tables.event(id)?;
            for fact in facts {
                if let PublicationAction::EventUpdated { event } = fact {
                    tables.events.insert(event.id, *event);
                }
            }
            Ok(state.event)
        })
    }
}

impl AdmissionStore for InMemoryStore {
    fn submit_request(
        &self,
        event_id: EventId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>> {
        Box::pin(async move {
            let lock = self.event_lock(event_id).await;
            let _guard = lock.lock().await;

            let mut state = {
                let tables = self.tables.read().await;
                tables.user(requester_id)?;
                let existing = tables
                    .requests
                    .values()
                    .filter(|r| r.event_id == event_id && r.requester_id == requester_id)
                    .cloned()
                    .collect::<Vec<_>>();
                AdmissionState::new(tables.event(event_id)?.clone(), tables.confirmed(event_id))
                    .with_requests(existing)
            };

            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::SubmitRequest { requester_id },
                &self.admission,
            )?;

            let mut tables = self.tables.write().await;
            tables.event(event_id)?;
            tables.user(requester_id)?;
            facts
                .into_iter()
                .filter_map(|fact| tables.apply_admission(fact))
                .last()
                .ok_or_else(|| DomainError::storage("submission produced no request"))
        })
    }

    fn cancel_request(
        &self,
        request_id: RequestId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>> {
        Box::pin(async move {
            let event_id = {
                let tables = self.tables.read().await;
                tables.user(requester_id)?;
                tables
                    .requests
                    .get(&request_id)
                    .map(|r| r.event_id)
                    .ok_or_else(|| DomainError::not_found(Entity::Request, request_id))?
            };

            let lock = self.event_lock(event_id).await;
            let _guard = lock.lock().await;

            let mut state = {
                let tables = self.tables.read().await;
                let request = tables.requests.get(&request_id).cloned();
                AdmissionState::new(tables.event(event_id)?.clone(), tables.confirmed(event_id))
                    .with_requests(request)
            };

            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::CancelRequest { request_id, requester_id },
                &self.admission,
            )?;

            let mut tables = self.tables.write().await;
            for fact in facts {
                tables.apply_admission(fact);
            }
            state
                .requests
                .remove(&request_id)
                .ok_or_else(|| DomainError::not_found(Entity::Request, request_id))
        })
    }

    fn moderate_requests(
        &self,
        event_id: EventId,
        owner_id: UserId,
        decision: StatusDecision,
    ) -> BoxFuture<'_, Result<ModerationResult>> {
        Box::pin(async move {
            let lock = self.event_lock(event_id).await;
            let _guard = lock.lock().await;

            let mut state = {
                let tables = self.tables.read().await;
                tables.user(owner_id)?;
                let selected = decision
                    .request_ids
                    .iter()
                    .filter_map(|id| tables.requests.get(id))
                    .filter(|r| r.event_id == event_id)
                    .cloned()
                    .collect::<Vec<_>>();
                AdmissionState::new(tables.event(event_id)?.clone(), tables.confirmed(event_id))
                    .with_requests(selected)
            };

            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::ModerateRequests {
                    owner_id,
                    request_ids: decision.request_ids,
                    status: decision.status,
                },
                &self.admission,
            )?;

            let mut tables = self.tables.write().await;
            for fact in facts {
                tables.apply_admission(fact);
            }
            Ok(state.moderation_result())
        })
    }

    fn requests_of(&self, requester_id: UserId) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            tables.user(requester_id)?;
            Ok(tables
                .requests
                .values()
                .filter(|r| r.requester_id == requester_id)
                .cloned()
                .collect())
        })
    }

    fn requests_for_event(
        &self,
        event_id: EventId,
        owner_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            tables.user(owner_id)?;
            let event = tables.event(event_id)?;
            if !event.is_owned_by(owner_id) {
                return Err(DomainError::not_found(Entity::Event, event_id));
            }
            Ok(tables
                .requests
                .values()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn confirmed_count(&self, event_id: EventId) -> BoxFuture<'_, Result<u32>> {
        Box::pin(async move { Ok(self.tables.read().await.confirmed(event_id)) })
    }

    fn confirmed_counts(&self, event_ids: Vec<EventId>) -> BoxFuture<'_, Result<ConfirmedCounts>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(ConfirmedCounts::from_requests(
                tables
                    .requests
                    .values()
                    .filter(|r| event_ids.contains(&r.event_id)),
            ))
        })
    }
}

impl CompilationStore for InMemoryStore {
    fn create_compilation(&self, input: NewCompilation) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move {
            input.validate()?;
            let mut tables = self.tables.write().await;
            tables.ensure_unique_compilation(&input.title, None)?;
            tables.ensure_events_exist(&input.events)?;
            let compilation = input.into_compilation(CompilationId::new(tables.next_id()));
            tables.compilations.insert(compilation.id, compilation.clone());
            Ok(compilation)
        })
    }

    fn update_compilation(
        &self,
        id: CompilationId,
        patch: CompilationPatch,
    ) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move {
            patch.validate()?;
            let mut tables = self.tables.write().await;
            let mut compilation = tables.compilation(id)?.clone();
            patch.apply(&mut compilation);
            tables.ensure_unique_compilation(&compilation.title, Some(id))?;
            tables.ensure_events_exist(&compilation.event_ids)?;
            tables.compilations.insert(id, compilation.clone());
            Ok(compilation)
        })
    }

    fn delete_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            tables.compilation(id)?;
            tables.compilations.remove(&id);
            Ok(())
        })
    }

    fn get_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move { self.tables.read().await.compilation(id).cloned() })
    }

    fn list_compilations(
        &self,
        pinned: Option<bool>,
        page: PageRequest,
    ) -> BoxFuture<'_, Result<Vec<Compilation>>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(page.slice(
                tables
                    .compilations
                    .values()
                    .filter(|c| pinned.is_none_or(|pinned| c.pinned == pinned))
                    .cloned(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::fixtures;
    use crate::mocks::test_clock;
    use eventhub_core::types::{EventState, RequestStatus, StateAction};

    fn store() -> InMemoryStore {
        InMemoryStore::with_clock(Arc::new(test_clock()))
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = store();
        store.create_user(fixtures::new_user("ann")).await.unwrap();

        let result = store.create_user(fixtures::new_user("ann")).await;

        assert!(matches!(
            result,
            Err(DomainError::Conflict(ConflictReason::DuplicateEmail(_)))
        ));
    }

    #[tokio::test]
    async fn test_category_in_use_cannot_be_deleted() {
        let store = store();
        let world = fixtures::seed(&store).await;

        let result = store.delete_category(world.category.id).await;

        assert_eq!(
            result,
            Err(DomainError::Conflict(ConflictReason::CategoryInUse(world.category.id)))
        );
    }

    #[tokio::test]
    async fn test_unpublished_event_rejects_requests() {
        let store = store();
        let world = fixtures::seed(&store).await;
        let participant = store.create_user(fixtures::new_user("bob")).await.unwrap();

        let result = store.submit_request(world.event.id, participant.id).await;

        assert!(matches!(
            result,
            Err(DomainError::NotFound { entity: Entity::Event, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_requester_is_not_found() {
        let store = store();
        let world = fixtures::seed(&store).await;
        fixtures::publish(&store, world.event.id).await;

        let result = store.submit_request(world.event.id, UserId::new(999)).await;

        assert_eq!(result, Err(DomainError::NotFound { entity: Entity::User, id: 999 }));
    }

    #[tokio::test]
    async fn test_cancel_frees_capacity() {
        let store = store();
        let world = fixtures::seed_with(&store, 1, false).await;
        fixtures::publish(&store, world.event.id).await;
        let ann = store.create_user(fixtures::new_user("ann")).await.unwrap();
        let bob = store.create_user(fixtures::new_user("bob")).await.unwrap();

        let first = store.submit_request(world.event.id, ann.id).await.unwrap();
        assert_eq!(first.status, RequestStatus::Confirmed);
        assert!(store.submit_request(world.event.id, bob.id).await.is_err());

        let canceled = store.cancel_request(first.id, ann.id).await.unwrap();
        assert_eq!(canceled.status, RequestStatus::Canceled);
        assert_eq!(store.confirmed_count(world.event.id).await.unwrap(), 0);

        let second = store.submit_request(world.event.id, bob.id).await.unwrap();
        assert_eq!(second.status, RequestStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_update_event_persists_new_state() {
        let store = store();
        let world = fixtures::seed(&store).await;

        let updated = store
            .update_event(
                world.event.id,
                Actor::Owner(world.owner.id),
                EventUpdate {
                    state_action: Some(StateAction::CancelReview),
                    ..EventUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.state, EventState::Canceled);
        assert_eq!(store.get_event(world.event.id).await.unwrap().state, EventState::Canceled);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let store = store();
        let world = fixtures::seed(&store).await;

        store.delete_user(world.owner.id).await.unwrap();

        assert!(store.get_event(world.event.id).await.is_err());
        assert!(store.delete_category(world.category.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_user_waits_for_event_lock() {
        let store = Arc::new(store());
        let world = fixtures::seed(store.as_ref()).await;
        fixtures::publish(store.as_ref(), world.event.id).await;
        let ann_id = store.create_user(fixtures::new_user("ann")).await.unwrap().id;
        let (owner_id, event_id) = (world.owner.id, world.event.id);

        let guard = store.event_lock(event_id).await.lock_owned().await;

        let deleting = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.delete_user(owner_id).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let submitting = tokio::spawn({
            let store = Arc::clone(&store);
            async move { store.submit_request(event_id, ann_id).await }
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(!deleting.is_finished());
        assert!(store.get_event(event_id).await.is_ok());

        drop(guard);
        deleting.await.unwrap().unwrap();
        let submitted = submitting.await.unwrap();

        assert!(matches!(
            submitted,
            Err(DomainError::NotFound { entity: Entity::Event, .. })
        ));
        assert!(store.requests_of(ann_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_compilations_follow_their_events() {
        let store = store();
        let world = fixtures::seed(&store).await;
        let page = PageRequest::new(0, 10).unwrap();

        let unknown = store
            .create_compilation(NewCompilation {
                title: "Weekend".to_string(),
                pinned: true,
                events: vec![world.event.id, EventId::new(999)],
            })
            .await;
        assert_eq!(unknown, Err(DomainError::not_found(Entity::Event, 999)));
        assert!(store.list_compilations(None, page).await.unwrap().is_empty());

        let pinned = store
            .create_compilation(NewCompilation {
                title: "Weekend".to_string(),
                pinned: true,
                events: vec![world.event.id, world.event.id],
            })
            .await
            .unwrap();
        let plain = store
            .create_compilation(NewCompilation { title: "Later".to_string(), ..NewCompilation::default() })
            .await
            .unwrap();
        assert_eq!(pinned.event_ids, vec![world.event.id]);

        let renamed = store
            .update_compilation(
                plain.id,
                CompilationPatch { title: Some("Weekend".to_string()), ..CompilationPatch::default() },
            )
            .await;
        assert!(matches!(
            renamed,
            Err(DomainError::Conflict(ConflictReason::DuplicateName(_)))
        ));
        assert_eq!(store.list_compilations(Some(true), page).await.unwrap(), vec![pinned.clone()]);
        assert_eq!(store.list_compilations(Some(false), page).await.unwrap(), vec![plain]);

        store.delete_user(world.owner.id).await.unwrap();
        assert!(store.get_compilation(pinned.id).await.unwrap().event_ids.is_empty());

        store.delete_compilation(pinned.id).await.unwrap();
        assert_eq!(
            store.get_compilation(pinned.id).await,
            Err(DomainError::not_found(Entity::Compilation, pinned.id))
        );
    }
}
