//! `PostgreSQL` implementation of the store traits.
//!
//! Capacity-affecting operations run in one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` on the event row
//! 2. recount `CONFIRMED` requests under that lock
//! 3. run the reducer against the loaded state
//! 4. write the facts it produced, then commit
//!
//! Concurrent writers on the same event queue on the row lock, so the
//! confirmed count can never exceed the participant limit.

use crate::rows::{
    convert_all, count, limit_column, CategoryRow, CompilationRow, EventRow, RequestRow, UserRow,
    COMPILATION_SELECT, EVENT_COLUMNS,
};
use crate::db_error;
use eventhub_core::admission::{
    AdmissionAction, AdmissionEnvironment, AdmissionReducer, AdmissionState, ModerationResult,
    SubmittedRequest,
};
use eventhub_core::capacity::ConfirmedCounts;
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
    Event, EventId, NewCompilation, NewEvent, NewUser, ParticipationRequest, RequestId,
    RequestStatus, User, UserId,
};
use eventhub_core::{ConflictReason, DomainError, Entity, Result};
use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;

const REQUEST_COLUMNS: &str = "id, event_id, requester_id, status, created";

/// `PostgreSQL`-backed users, categories, events and requests.
///
/// # Example
///
/// ```no_run
/// use eventhub_postgres::PostgresStore;
/// use eventhub_core::environment::SystemClock;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresStore::connect("postgres://localhost/eventhub", Arc::new(SystemClock)).await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    admission: AdmissionEnvironment,
    publication: PublicationEnvironment,
}

impl PostgresStore {
    /// Creates a store over an existing pool
    #[must_use]
    pub const fn new(
        pool: PgPool,
        admission: AdmissionEnvironment,
        publication: PublicationEnvironment,
    ) -> Self {
        Self { pool, admission, publication }
    }

    /// Creates a store with default lead times (owner 2h, admin 1h)
    #[must_use]
    pub fn from_pool(pool: PgPool, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self::new(
            pool,
            AdmissionEnvironment::new(std::sync::Arc::clone(&clock)),
            PublicationEnvironment::new(
                clock,
                chrono::Duration::hours(2),
                chrono::Duration::hours(1),
            ),
        )
    }

    /// Connects to `database_url` with default lead times.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Unavailable`] if the database cannot be reached.
    pub async fn connect(database_url: &str, clock: std::sync::Arc<dyn Clock>) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| DomainError::Unavailable(format!("failed to connect: {e}")))?;
        Ok(Self::from_pool(pool, clock))
    }

    /// Runs the schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

// ============================================================================
// Query helpers
// ============================================================================

async fn fetch_user(conn: &mut PgConnection, id: UserId) -> Result<User> {
    sqlx::query_as::<_, UserRow>("SELECT id, name, email FROM users WHERE id = $1")
        .bind(id.get())
        .fetch_optional(conn)
        .await
        .map_err(db_error("load user"))?
        .map(User::from)
        .ok_or_else(|| DomainError::not_found(Entity::User, id))
}

async fn fetch_category(conn: &mut PgConnection, id: CategoryId) -> Result<Category> {
    sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM categories WHERE id = $1")
        .bind(id.get())
        .fetch_optional(conn)
        .await
        .map_err(db_error("load category"))?
        .map(Category::from)
        .ok_or_else(|| DomainError::not_found(Entity::Category, id))
}

async fn category_exists(conn: &mut PgConnection, id: CategoryId) -> Result<bool> {
    let (exists,): (bool,) =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
            .bind(id.get())
            .fetch_one(conn)
            .await
            .map_err(db_error("check category"))?;
    Ok(exists)
}

async fn fetch_event(conn: &mut PgConnection, id: EventId, lock: bool) -> Result<Event> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, EventRow>(&sql)
        .bind(id.get())
        .fetch_optional(conn)
        .await
        .map_err(db_error("load event"))?
        .ok_or_else(|| DomainError::not_found(Entity::Event, id))
        .and_then(Event::try_from)
}

async fn fetch_compilation(conn: &mut PgConnection, id: CompilationId) -> Result<Compilation> {
    let sql = format!("{COMPILATION_SELECT} WHERE c.id = $1 GROUP BY c.id");
    sqlx::query_as::<_, CompilationRow>(&sql)
        .bind(id.get())
        .fetch_optional(conn)
        .await
        .map_err(db_error("load compilation"))?
        .map(Compilation::from)
        .ok_or_else(|| DomainError::not_found(Entity::Compilation, id))
}

/// Fails with `NotFound` on the lowest event id that does not exist
async fn ensure_events_exist(conn: &mut PgConnection, ids: &[EventId]) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let missing: Option<(i64,)> = sqlx::query_as(
        r"
        SELECT u.id FROM UNNEST($1::BIGINT[]) AS u(id)
        WHERE NOT EXISTS (SELECT 1 FROM events e WHERE e.id = u.id)
        ORDER BY u.id
        LIMIT 1
        ",
    )
    .bind(raw)
    .fetch_optional(conn)
    .await
    .map_err(db_error("check compilation events"))?;
    match missing {
        Some((id,)) => Err(DomainError::not_found(Entity::Event, id)),
        None => Ok(()),
    }
}

async fn replace_members(
    conn: &mut PgConnection,
    id: CompilationId,
    event_ids: &[EventId],
) -> Result<()> {
    sqlx::query("DELETE FROM compilation_events WHERE compilation_id = $1")
        .bind(id.get())
        .execute(&mut *conn)
        .await
        .map_err(db_error("clear compilation events"))?;
    if event_ids.is_empty() {
        return Ok(());
    }
    let raw: Vec<i64> = event_ids.iter().map(|id| id.get()).collect();
    sqlx::query(
        "INSERT INTO compilation_events (compilation_id, event_id) \
         SELECT $1, UNNEST($2::BIGINT[])",
    )
    .bind(id.get())
    .bind(raw)
    .execute(conn)
    .await
    .map_err(db_error("insert compilation events"))?;
    Ok(())
}

async fn confirmed_for(conn: &mut PgConnection, event_id: EventId) -> Result<u32> {
    let (confirmed,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM requests WHERE event_id = $1 AND status = $2")
            .bind(event_id.get())
            .bind(RequestStatus::Confirmed.as_str())
            .fetch_one(conn)
            .await
            .map_err(db_error("count confirmed requests"))?;
    count(confirmed)
}

async fn fetch_requests(
    conn: &mut PgConnection,
    sql: &str,
    binds: (i64, Option<i64>),
) -> Result<Vec<ParticipationRequest>> {
    let mut query = sqlx::query_as::<_, RequestRow>(sql).bind(binds.0);
    if let Some(second) = binds.1 {
        query = query.bind(second);
    }
    let rows = query
        .fetch_all(conn)
        .await
        .map_err(db_error("load requests"))?;
    convert_all(rows)
}

/// Writes one admission fact, returning the row it produced or changed
async fn apply_admission(
    conn: &mut PgConnection,
    fact: AdmissionAction,
) -> Result<Option<ParticipationRequest>> {
    match fact {
        AdmissionAction::RequestSubmitted(submitted) => insert_request(conn, submitted).await.map(Some),
        AdmissionAction::RequestStatusChanged { request_id, to, .. } => {
            let sql = format!("UPDATE requests SET status = $1 WHERE id = $2 RETURNING {REQUEST_COLUMNS}");
            let row = sqlx::query_as::<_, RequestRow>(&sql)
                .bind(to.as_str())
                .bind(request_id.get())
                .fetch_optional(conn)
                .await
                .map_err(db_error("update request status"))?;
            row.map(ParticipationRequest::try_from).transpose()
        },
        _ => Ok(None),
    }
}

async fn insert_request(
    conn: &mut PgConnection,
    submitted: SubmittedRequest,
) -> Result<ParticipationRequest> {
    let sql = format!(
        "INSERT INTO requests (event_id, requester_id, status, created) \
         VALUES ($1, $2, $3, $4) RETURNING {REQUEST_COLUMNS}"
    );
    sqlx::query_as::<_, RequestRow>(&sql)
        .bind(submitted.event_id.get())
        .bind(submitted.requester_id.get())
        .bind(submitted.status.as_str())
        .bind(submitted.created)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::from(ConflictReason::DuplicateRequest {
                    event_id: submitted.event_id,
                    requester_id: submitted.requester_id,
                })
            } else {
                db_error("insert request")(e)
            }
        })
        .and_then(ParticipationRequest::try_from)
}

async fn write_event(conn: &mut PgConnection, event: &Event) -> Result<()> {
    sqlx::query(
        r"
        UPDATE events
        SET title = $2, annotation = $3, description = $4, category_id = $5,
            lat = $6, lon = $7, paid = $8, participant_limit = $9,
            request_moderation = $10, event_date = $11, published_on = $12,
            state = $13, moderation_comment = $14
        WHERE id = $1
        ",
    )
    .bind(event.id.get())
    .bind(&event.title)
    .bind(&event.annotation)
    .bind(&event.description)
    .bind(event.category_id.get())
    .bind(event.location.lat)
    .bind(event.location.lon)
    .bind(event.paid)
    .bind(limit_column(event.participant_limit)?)
    .bind(event.request_moderation)
    .bind(event.event_date)
    .bind(event.published_on)
    .bind(event.state.as_str())
    .bind(&event.moderation_comment)
    .execute(conn)
    .await
    .map_err(db_error("update event"))?;
    Ok(())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Appends the `WHERE` clause of an event search
fn push_filter(query: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    query.push(" WHERE TRUE");
    if !filter.ids.is_empty() {
        let ids: Vec<i64> = filter.ids.iter().map(|id| id.get()).collect();
        query.push(" AND e.id = ANY(").push_bind(ids).push(")");
    }
    if !filter.initiators.is_empty() {
        let ids: Vec<i64> = filter.initiators.iter().map(|id| id.get()).collect();
        query.push(" AND e.initiator_id = ANY(").push_bind(ids).push(")");
    }
    if !filter.states.is_empty() {
        let states: Vec<String> = filter.states.iter().map(|s| s.as_str().to_string()).collect();
        query.push(" AND e.state = ANY(").push_bind(states).push(")");
    }
    if !filter.categories.is_empty() {
        let ids: Vec<i64> = filter.categories.iter().map(|id| id.get()).collect();
        query.push(" AND e.category_id = ANY(").push_bind(ids).push(")");
    }
    if let Some(needle) = filter.needle() {
        query
            .push(" AND (POSITION(")
            .push_bind(needle.clone())
            .push(" IN LOWER(e.annotation)) > 0 OR POSITION(")
            .push_bind(needle)
            .push(" IN LOWER(e.description)) > 0)");
    }
    if let Some(paid) = filter.paid {
        query.push(" AND e.paid = ").push_bind(paid);
    }
    if let Some(start) = filter.range_start {
        query.push(" AND e.event_date >= ").push_bind(start);
    }
    if let Some(end) = filter.range_end {
        query.push(" AND e.event_date <= ").push_bind(end);
    }
    if filter.only_available {
        query
            .push(
                " AND (e.participant_limit = 0 OR e.participant_limit > \
                 (SELECT COUNT(*) FROM requests r WHERE r.event_id = e.id AND r.status = ",
            )
            .push_bind(RequestStatus::Confirmed.as_str())
            .push("))");
    }
}

// ============================================================================
// Directory
// ============================================================================

impl Directory for PostgresStore {
    #[tracing::instrument(skip(self, user), fields(email = %user.email))]
    fn create_user(&self, user: NewUser) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            user.validate()?;
            let row = sqlx::query_as::<_, UserRow>(
                "INSERT INTO users (name, email) VALUES ($1, $2) RETURNING id, name, email",
            )
            .bind(&user.name)
            .bind(&user.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::from(ConflictReason::DuplicateEmail(user.email.clone()))
                } else {
                    db_error("insert user")(e)
                }
            })?;
            Ok(User::from(row))
        })
    }

    fn get_user(&self, id: UserId) -> BoxFuture<'_, Result<User>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_user(&mut conn, id).await
        })
    }

    fn list_users(&self, ids: Vec<UserId>, page: PageRequest) -> BoxFuture<'_, Result<Vec<User>>> {
        Box::pin(async move {
            let ids: Vec<i64> = ids.into_iter().map(UserId::get).collect();
            let rows = sqlx::query_as::<_, UserRow>(
                r"
                SELECT id, name, email FROM users
                WHERE cardinality($1::BIGINT[]) = 0 OR id = ANY($1)
                ORDER BY id
                LIMIT $2 OFFSET $3
                ",
            )
            .bind(ids)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list users"))?;
            Ok(rows.into_iter().map(User::from).collect())
        })
    }

    #[tracing::instrument(skip(self))]
    fn delete_user(&self, id: UserId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            // Events and requests go with the user via ON DELETE CASCADE
            let result = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(id.get())
                .execute(&self.pool)
                .await
                .map_err(db_error("delete user"))?;
            if result.rows_affected() == 0 {
                return Err(DomainError::not_found(Entity::User, id));
            }
            Ok(())
        })
    }

    #[tracing::instrument(skip(self))]
    fn create_category(&self, name: String) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move {
            validate_category_name(&name)?;
            let row = sqlx::query_as::<_, CategoryRow>(
                "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
            )
            .bind(&name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::from(ConflictReason::DuplicateName(name.clone()))
                } else {
                    db_error("insert category")(e)
                }
            })?;
            Ok(Category::from(row))
        })
    }

    #[tracing::instrument(skip(self))]
    fn rename_category(&self, id: CategoryId, name: String) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move {
            validate_category_name(&name)?;
            sqlx::query_as::<_, CategoryRow>(
                "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name",
            )
            .bind(id.get())
            .bind(&name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::from(ConflictReason::DuplicateName(name.clone()))
                } else {
                    db_error("rename category")(e)
                }
            })?
            .map(Category::from)
            .ok_or_else(|| DomainError::not_found(Entity::Category, id))
        })
    }

    #[tracing::instrument(skip(self))]
    fn delete_category(&self, id: CategoryId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            fetch_category(&mut tx, id).await?;

            let (in_use,): (bool,) =
                sqlx::query_as("SELECT EXISTS(SELECT 1 FROM events WHERE category_id = $1)")
                    .bind(id.get())
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(db_error("check category usage"))?;
            if in_use {
                return Err(ConflictReason::CategoryInUse(id).into());
            }

            sqlx::query("DELETE FROM categories WHERE id = $1")
                .bind(id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_foreign_key_violation(&e) {
                        DomainError::from(ConflictReason::CategoryInUse(id))
                    } else {
                        db_error("delete category")(e)
                    }
                })?;
            tx.commit().await.map_err(db_error("commit"))?;
            Ok(())
        })
    }

    fn get_category(&self, id: CategoryId) -> BoxFuture<'_, Result<Category>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_category(&mut conn, id).await
        })
    }

    fn list_categories(&self, page: PageRequest) -> BoxFuture<'_, Result<Vec<Category>>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, CategoryRow>(
                "SELECT id, name FROM categories ORDER BY id LIMIT $1 OFFSET $2",
            )
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list categories"))?;
            Ok(rows.into_iter().map(Category::from).collect())
        })
    }
}

// ============================================================================
// Events
// ============================================================================

impl EventCatalog for PostgresStore {
    #[tracing::instrument(skip(self, input))]
    fn create_event(&self, initiator_id: UserId, input: NewEvent) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            let now = self.publication.clock.now();
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_user(&mut conn, initiator_id).await?;
            fetch_category(&mut conn, input.category_id).await?;
            input.validate(now, self.publication.owner_min_lead)?;

            // Id is assigned by the insert; the placeholder never reaches the database
            let draft = input.into_event(EventId::new(0), initiator_id, now);
            let sql = format!(
                "INSERT INTO events AS e (title, annotation, description, category_id, \
                 initiator_id, lat, lon, paid, participant_limit, request_moderation, \
                 event_date, created_on, published_on, state, moderation_comment) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
                 RETURNING {EVENT_COLUMNS}"
            );
            let row = sqlx::query_as::<_, EventRow>(&sql)
                .bind(&draft.title)
                .bind(&draft.annotation)
                .bind(&draft.description)
                .bind(draft.category_id.get())
                .bind(draft.initiator_id.get())
                .bind(draft.location.lat)
                .bind(draft.location.lon)
                .bind(draft.paid)
                .bind(limit_column(draft.participant_limit)?)
                .bind(draft.request_moderation)
                .bind(draft.event_date)
                .bind(draft.created_on)
                .bind(draft.published_on)
                .bind(draft.state.as_str())
                .bind(&draft.moderation_comment)
                .fetch_one(&mut *conn)
                .await
                .map_err(db_error("insert event"))?;

            let event = Event::try_from(row)?;
            tracing::info!(event_id = %event.id, "Event created");
            Ok(event)
        })
    }

    fn get_event(&self, id: EventId) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_event(&mut conn, id, false).await
        })
    }

    fn list_events(&self, filter: EventFilter, page: PageRequest) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(async move {
            filter.validate()?;
            let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events e"));
            push_filter(&mut query, &filter);
            query.push(match filter.order {
                EventOrder::Id => " ORDER BY e.id",
                EventOrder::EventDate => " ORDER BY e.event_date, e.id",
            });
            query
                .push(" LIMIT ")
                .push_bind(page.limit())
                .push(" OFFSET ")
                .push_bind(page.offset());

            let rows = query
                .build_query_as::<EventRow>()
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("search events"))?;
            convert_all(rows)
        })
    }

    #[tracing::instrument(skip(self, update))]
    fn update_event(
        &self,
        id: EventId,
        actor: Actor,
        update: EventUpdate,
    ) -> BoxFuture<'_, Result<Event>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            if let Actor::Owner(user_id) = actor {
                fetch_user(&mut tx, user_id).await?;
            }
            let event = fetch_event(&mut tx, id, true).await?;
            let confirmed = confirmed_for(&mut tx, id).await?;
            let mut known_category = None;
            if let Some(category_id) = update.patch.category_id {
                if category_exists(&mut tx, category_id).await? {
                    known_category = Some(category_id);
                }
            }

            let mut state = PublicationState::new(event, confirmed).with_known_category(known_category);
            let facts = PublicationReducer::new().execute(
                &mut state,
                PublicationAction::UpdateEvent { actor, update },
                &self.publication,
            )?;

            for fact in facts {
                if let PublicationAction::EventUpdated { event } = fact {
                    write_event(&mut tx, &event).await?;
                }
            }
            tx.commit().await.map_err(db_error("commit"))?;

            tracing::debug!(event_id = %id, state = %state.event.state, "Event updated");
            Ok(state.event)
        })
    }
}

// ============================================================================
// Admission
// ============================================================================

impl AdmissionStore for PostgresStore {
    #[tracing::instrument(skip(self))]
    fn submit_request(
        &self,
        event_id: EventId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            fetch_user(&mut tx, requester_id).await?;
            let event = fetch_event(&mut tx, event_id, true).await?;
            let confirmed = confirmed_for(&mut tx, event_id).await?;
            let existing = fetch_requests(
                &mut tx,
                &format!(
                    "SELECT {REQUEST_COLUMNS} FROM requests WHERE event_id = $1 AND requester_id = $2"
                ),
                (event_id.get(), Some(requester_id.get())),
            )
            .await?;

            let mut state = AdmissionState::new(event, confirmed).with_requests(existing);
            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::SubmitRequest { requester_id },
                &self.admission,
            )?;

            let mut created = None;
            for fact in facts {
                if let Some(request) = apply_admission(&mut tx, fact).await? {
                    created = Some(request);
                }
            }
            tx.commit().await.map_err(db_error("commit"))?;

            let request = created.ok_or_else(|| DomainError::storage("submission produced no request"))?;
            tracing::info!(request_id = %request.id, status = %request.status, "Request submitted");
            Ok(request)
        })
    }

    #[tracing::instrument(skip(self))]
    fn cancel_request(
        &self,
        request_id: RequestId,
        requester_id: UserId,
    ) -> BoxFuture<'_, Result<ParticipationRequest>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            fetch_user(&mut tx, requester_id).await?;
            let (event_id,): (i64,) = sqlx::query_as("SELECT event_id FROM requests WHERE id = $1")
                .bind(request_id.get())
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error("load request"))?
                .ok_or_else(|| DomainError::not_found(Entity::Request, request_id))?;
            let event_id = EventId::new(event_id);

            let event = fetch_event(&mut tx, event_id, true).await?;
            let confirmed = confirmed_for(&mut tx, event_id).await?;
            let request = fetch_requests(
                &mut tx,
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE id = $1"),
                (request_id.get(), None),
            )
            .await?;

            let mut state = AdmissionState::new(event, confirmed).with_requests(request);
            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::CancelRequest { request_id, requester_id },
                &self.admission,
            )?;
            for fact in facts {
                apply_admission(&mut tx, fact).await?;
            }
            tx.commit().await.map_err(db_error("commit"))?;

            state
                .requests
                .remove(&request_id)
                .ok_or_else(|| DomainError::not_found(Entity::Request, request_id))
        })
    }

    #[tracing::instrument(skip(self, decision), fields(batch = decision.request_ids.len(), status = %decision.status))]
    fn moderate_requests(
        &self,
        event_id: EventId,
        owner_id: UserId,
        decision: StatusDecision,
    ) -> BoxFuture<'_, Result<ModerationResult>> {
        Box::pin(async move {
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            fetch_user(&mut tx, owner_id).await?;
            let event = fetch_event(&mut tx, event_id, true).await?;
            let confirmed = confirmed_for(&mut tx, event_id).await?;

            let ids: Vec<i64> = decision.request_ids.iter().map(|id| id.get()).collect();
            let sql = format!(
                "SELECT {REQUEST_COLUMNS} FROM requests \
                 WHERE id = ANY($1) AND event_id = $2 ORDER BY id FOR UPDATE"
            );
            let rows = sqlx::query_as::<_, RequestRow>(&sql)
                .bind(ids)
                .bind(event_id.get())
                .fetch_all(&mut *tx)
                .await
                .map_err(db_error("load moderated requests"))?;
            let selected: Vec<ParticipationRequest> = convert_all(rows)?;

            let mut state = AdmissionState::new(event, confirmed).with_requests(selected);
            let facts = AdmissionReducer::new().execute(
                &mut state,
                AdmissionAction::ModerateRequests {
                    owner_id,
                    request_ids: decision.request_ids,
                    status: decision.status,
                },
                &self.admission,
            )?;
            for fact in facts {
                apply_admission(&mut tx, fact).await?;
            }
            tx.commit().await.map_err(db_error("commit"))?;

            let result = state.moderation_result();
            tracing::info!(
                confirmed = result.confirmed_requests.len(),
                rejected = result.rejected_requests.len(),
                "Requests moderated"
            );
            Ok(result)
        })
    }

    fn requests_of(&self, requester_id: UserId) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_user(&mut conn, requester_id).await?;
            fetch_requests(
                &mut conn,
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE requester_id = $1 ORDER BY id"),
                (requester_id.get(), None),
            )
            .await
        })
    }

    fn requests_for_event(
        &self,
        event_id: EventId,
        owner_id: UserId,
    ) -> BoxFuture<'_, Result<Vec<ParticipationRequest>>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_user(&mut conn, owner_id).await?;
            let event = fetch_event(&mut conn, event_id, false).await?;
            if !event.is_owned_by(owner_id) {
                return Err(DomainError::not_found(Entity::Event, event_id));
            }
            fetch_requests(
                &mut conn,
                &format!("SELECT {REQUEST_COLUMNS} FROM requests WHERE event_id = $1 ORDER BY id"),
                (event_id.get(), None),
            )
            .await
        })
    }

    fn confirmed_count(&self, event_id: EventId) -> BoxFuture<'_, Result<u32>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            confirmed_for(&mut conn, event_id).await
        })
    }

    fn confirmed_counts(&self, event_ids: Vec<EventId>) -> BoxFuture<'_, Result<ConfirmedCounts>> {
        Box::pin(async move {
            if event_ids.is_empty() {
                return Ok(ConfirmedCounts::default());
            }
            let ids: Vec<i64> = event_ids.into_iter().map(EventId::get).collect();
            let rows: Vec<(i64, i64)> = sqlx::query_as(
                r"
                SELECT event_id, COUNT(*) FROM requests
                WHERE event_id = ANY($1) AND status = $2
                GROUP BY event_id
                ",
            )
            .bind(ids)
            .bind(RequestStatus::Confirmed.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("count confirmed requests"))?;

            let counts = rows
                .into_iter()
                .map(|(event_id, confirmed)| Ok((EventId::new(event_id), count(confirmed)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            Ok(ConfirmedCounts::new(counts))
        })
    }
}

// ============================================================================
// Compilations
// ============================================================================

impl CompilationStore for PostgresStore {
    #[tracing::instrument(skip(self, input), fields(title = %input.title))]
    fn create_compilation(&self, input: NewCompilation) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move {
            input.validate()?;
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            let title = input.title.clone();
            let (id,): (i64,) = sqlx::query_as(
                "INSERT INTO compilations (title, pinned) VALUES ($1, $2) RETURNING id",
            )
            .bind(&input.title)
            .bind(input.pinned)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::from(ConflictReason::DuplicateName(title.clone()))
                } else {
                    db_error("insert compilation")(e)
                }
            })?;

            let compilation = input.into_compilation(CompilationId::new(id));
            ensure_events_exist(&mut tx, &compilation.event_ids).await?;
            replace_members(&mut tx, compilation.id, &compilation.event_ids).await?;
            tx.commit().await.map_err(db_error("commit"))?;
            Ok(compilation)
        })
    }

    #[tracing::instrument(skip(self, patch))]
    fn update_compilation(
        &self,
        id: CompilationId,
        patch: CompilationPatch,
    ) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move {
            patch.validate()?;
            let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;
            let locked: Option<(i64,)> =
                sqlx::query_as("SELECT id FROM compilations WHERE id = $1 FOR UPDATE")
                    .bind(id.get())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(db_error("lock compilation"))?;
            if locked.is_none() {
                return Err(DomainError::not_found(Entity::Compilation, id));
            }

            let mut compilation = fetch_compilation(&mut tx, id).await?;
            let replaces_members = patch.events.is_some();
            patch.apply(&mut compilation);

            sqlx::query("UPDATE compilations SET title = $2, pinned = $3 WHERE id = $1")
                .bind(id.get())
                .bind(&compilation.title)
                .bind(compilation.pinned)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        DomainError::from(ConflictReason::DuplicateName(compilation.title.clone()))
                    } else {
                        db_error("update compilation")(e)
                    }
                })?;
            if replaces_members {
                ensure_events_exist(&mut tx, &compilation.event_ids).await?;
                replace_members(&mut tx, id, &compilation.event_ids).await?;
            }
            tx.commit().await.map_err(db_error("commit"))?;
            Ok(compilation)
        })
    }

    #[tracing::instrument(skip(self))]
    fn delete_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM compilations WHERE id = $1")
                .bind(id.get())
                .execute(&self.pool)
                .await
                .map_err(db_error("delete compilation"))?;
            if result.rows_affected() == 0 {
                return Err(DomainError::not_found(Entity::Compilation, id));
            }
            Ok(())
        })
    }

    fn get_compilation(&self, id: CompilationId) -> BoxFuture<'_, Result<Compilation>> {
        Box::pin(async move {
            let mut conn = self.pool.acquire().await.map_err(db_error("acquire connection"))?;
            fetch_compilation(&mut conn, id).await
        })
    }

    fn list_compilations(
        &self,
        pinned: Option<bool>,
        page: PageRequest,
    ) -> BoxFuture<'_, Result<Vec<Compilation>>> {
        Box::pin(async move {
            let sql = format!(
                "{COMPILATION_SELECT} WHERE ($1::BOOLEAN IS NULL OR c.pinned = $1) \
                 GROUP BY c.id ORDER BY c.id LIMIT $2 OFFSET $3"
            );
            let rows = sqlx::query_as::<_, CompilationRow>(&sql)
                .bind(pinned)
                .bind(page.limit())
                .bind(page.offset())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("list compilations"))?;
            Ok(rows.into_iter().map(Compilation::from).collect())
        })
    }
}
