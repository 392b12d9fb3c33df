//! The generic repository: entity lifecycle, criteria and text queries,
//! count derivation, native SQL and session passthroughs over any
//! [`Session`] engine.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use daokit_core::{
    Binding, Dialect, EntityDef, EntityMeta, FromRow, FromValue, HasId, LockMode, NamedOrder,
    Order, OrmError, OrmResult, QueryHandle, QuerySource, ReplicationMode, Restriction, Row,
    RowShape, RowTransform, Session, SoftDelete, SqlAliases, ToRow, ToValue, Value, Window, Work,
};
use tracing::{debug, warn};

use crate::query::{build_query, build_sql_query, configure_projection};

/// Alias used for the repository's own entity in generated query text.
pub const DEFAULT_ALIAS: &str = "X";

#[inline]
fn obs(op: &str, entity: &str, start: Instant, rows: usize, success: bool) {
    let elapsed = start.elapsed().as_millis() as u64;
    debug!(
        entity = entity,
        op = op,
        rows = rows,
        elapsed_ms = elapsed,
        success = success,
        "repository op"
    );
    #[cfg(feature = "metrics")]
    {
        metrics::counter!("daokit_repository_calls_total", 1, "op" => op.to_string(), "entity" => entity.to_string(), "success" => success.to_string());
        metrics::histogram!("daokit_repository_call_ms", elapsed as f64, "op" => op.to_string(), "entity" => entity.to_string());
    }
}

fn require_id<T: HasId>(entity: &T) -> OrmResult<T::Key> {
    entity.id().ok_or_else(|| {
        OrmError::storage_message(format!("`{}` instance has no identifier", T::ENTITY_NAME))
    })
}

fn len_or_zero<X>(out: &OrmResult<Vec<X>>) -> usize {
    out.as_ref().map_or(0, Vec::len)
}

/// Deferred reference produced by [`GenericRepository::load`].
///
/// Creation performs no row fetch; [`LazyRef::resolve`] reads current
/// state and fails if the identity no longer exists, unlike the
/// absent-tolerant [`GenericRepository::get`].
pub struct LazyRef<T, S>
where
    T: HasId + FromRow,
    S: Session,
{
    session: Arc<S>,
    entity_name: String,
    id: T::Key,
    _marker: PhantomData<T>,
}

impl<T, S> LazyRef<T, S>
where
    T: HasId + FromRow,
    S: Session,
{
    pub fn id(&self) -> &T::Key {
        &self.id
    }

    pub async fn resolve(&self) -> OrmResult<T> {
        match self
            .session
            .get(&self.entity_name, self.id.to_value())
            .await?
        {
            Some(row) => T::from_row(&row),
            None => Err(OrmError::storage_message(format!(
                "deferred `{}` reference does not resolve",
                self.entity_name
            ))),
        }
    }
}

/// Entity-generic data access over a shared [`Session`].
///
/// The repository is a stateless dispatcher: all per-call state lives in
/// the engine, which the repository shares but does not own. Instances
/// are cheap and safe to share across tasks.
pub struct GenericRepository<T, S>
where
    T: EntityDef + HasId + ToRow + FromRow + Clone + Send + Sync + 'static,
    S: Session,
{
    session: Arc<S>,
    soft_delete: Option<SoftDelete>,
    named_order: NamedOrder,
    _marker: PhantomData<T>,
}

impl<T, S> GenericRepository<T, S>
where
    T: EntityDef + HasId + ToRow + FromRow + Clone + Send + Sync + 'static,
    S: Session,
{
    pub fn new(session: Arc<S>) -> Self {
        Self {
            session,
            soft_delete: None,
            named_order: NamedOrder::default(),
            _marker: PhantomData,
        }
    }

    /// Replaces physical deletes with updates that set the policy's
    /// marker property.
    pub fn with_soft_delete(mut self, policy: SoftDelete) -> Self {
        self.soft_delete = Some(policy);
        self
    }

    /// Selects how positional values meet named parameters. The default
    /// is the tail-first compatibility order.
    pub fn with_named_order(mut self, order: NamedOrder) -> Self {
        self.named_order = order;
        self
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn meta(&self) -> OrmResult<EntityMeta> {
        self.session.metadata(T::ENTITY_NAME)
    }

    /// Entity name as the engine resolves it, not the declared constant.
    pub fn entity_name(&self) -> OrmResult<String> {
        Ok(self.meta()?.entity_name)
    }

    /// Identifier property as the engine resolves it.
    pub fn id_property(&self) -> OrmResult<String> {
        Ok(self.meta()?.id_property)
    }

    async fn read_back(&self, name: &str, id: Value) -> OrmResult<T> {
        match self.session.get(name, id).await? {
            Some(row) => T::from_row(&row),
            None => Err(OrmError::storage_message(format!(
                "`{name}` row not readable after save"
            ))),
        }
    }

    async fn collect_rows<X: FromRow>(&self, handle: &mut S::Handle) -> OrmResult<Vec<X>> {
        let rows = handle.rows().await?;
        rows.iter().map(X::from_row).collect()
    }

    async fn collect_shapes<P: RowShape>(&self, handle: &mut S::Handle) -> OrmResult<Vec<P>> {
        let rows = handle.rows().await?;
        rows.iter().map(P::from_projected).collect()
    }

    // --- entity lifecycle ---------------------------------------------

    /// Persists a transient entity. The generated identity is observable
    /// in the returned copy.
    pub async fn insert(&self, entity: &T) -> OrmResult<T> {
        self.save_with("insert", entity).await
    }

    /// Same contract as [`insert`](Self::insert).
    pub async fn save(&self, entity: &T) -> OrmResult<T> {
        self.save_with("save", entity).await
    }

    async fn save_with(&self, op: &str, entity: &T) -> OrmResult<T> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match self.session.save(&name, entity.to_row()).await {
            Ok(id) => self.read_back(&name, id).await,
            Err(e) => Err(e),
        };
        obs(op, &name, start, 1, out.is_ok());
        out
    }

    /// Flushes the state of an already persisted entity.
    pub async fn update(&self, entity: &T) -> OrmResult<()> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = self.session.update(&name, entity.to_row()).await;
        obs("update", &name, start, 1, out.is_ok());
        out
    }

    /// Saves or updates depending on identity presence; the engine
    /// decides. Returns the persisted copy.
    pub async fn save_or_update(&self, entity: &T) -> OrmResult<T> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match self.session.save_or_update(&name, entity.to_row()).await {
            Ok(id) => self.read_back(&name, id).await,
            Err(e) => Err(e),
        };
        obs("save_or_update", &name, start, 1, out.is_ok());
        out
    }

    /// Merges state and returns the managed copy, which is a distinct
    /// value from the argument.
    pub async fn merge(&self, entity: &T) -> OrmResult<T> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match self.session.merge(&name, entity.to_row()).await {
            Ok(row) => T::from_row(&row),
            Err(e) => Err(e),
        };
        obs("merge", &name, start, 1, out.is_ok());
        out
    }

    /// Persist with deferred-insert semantics: no identity is reported
    /// back through this call.
    pub async fn persist(&self, entity: &T) -> OrmResult<()> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = self.session.persist(&name, entity.to_row()).await;
        obs("persist", &name, start, 1, out.is_ok());
        out
    }

    /// Deletes an entity. `None` is a logged no-op, not an error. With a
    /// soft-delete policy installed the marker property is set and an
    /// update issued instead of a physical delete.
    pub async fn delete(&self, entity: Option<&T>) -> OrmResult<()> {
        let Some(entity) = entity else {
            warn!(entity = T::ENTITY_NAME, "delete of absent entity ignored");
            return Ok(());
        };
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match &self.soft_delete {
            Some(policy) => self.mark_deleted(&name, policy, entity).await,
            None => self.delete_physical(&name, entity).await,
        };
        obs("delete", &name, start, 1, out.is_ok());
        out
    }

    async fn delete_physical(&self, name: &str, entity: &T) -> OrmResult<()> {
        let id = require_id(entity)?;
        self.session.delete(name, id.to_value()).await
    }

    async fn mark_deleted(&self, name: &str, policy: &SoftDelete, entity: &T) -> OrmResult<()> {
        let mut row = entity.to_row();
        if !row.contains(policy.property()) {
            return Err(OrmError::storage_message(format!(
                "soft-delete property `{}` does not exist on `{name}`",
                policy.property()
            )));
        }
        row.set(policy.property(), policy.marker().clone());
        self.session.update(name, row).await
    }

    /// Fetches by identity and delegates to [`delete`](Self::delete); an
    /// id that does not resolve becomes the logged no-op.
    pub async fn delete_by_id(&self, id: &T::Key) -> OrmResult<()> {
        let found = self.get(id).await?;
        self.delete(found.as_ref()).await
    }

    pub async fn insert_all(&self, entities: &[T]) -> OrmResult<()> {
        for entity in entities {
            self.insert(entity).await?;
        }
        Ok(())
    }

    pub async fn save_all(&self, entities: &[T]) -> OrmResult<()> {
        for entity in entities {
            self.save(entity).await?;
        }
        Ok(())
    }

    pub async fn update_all(&self, entities: &[T]) -> OrmResult<()> {
        for entity in entities {
            self.update(entity).await?;
        }
        Ok(())
    }

    pub async fn delete_all(&self, ids: &[T::Key]) -> OrmResult<()> {
        for id in ids {
            self.delete_by_id(id).await?;
        }
        Ok(())
    }

    pub async fn delete_all_entities(&self, entities: &[T]) -> OrmResult<()> {
        for entity in entities {
            self.delete(Some(entity)).await?;
        }
        Ok(())
    }

    // --- reads --------------------------------------------------------

    /// Fetches by identity. An absent row is `None`, never an error.
    pub async fn get(&self, id: &T::Key) -> OrmResult<Option<T>> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match self.session.get(&name, id.to_value()).await {
            Ok(Some(row)) => T::from_row(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        let rows = out.as_ref().map_or(0, |found| usize::from(found.is_some()));
        obs("get", &name, start, rows, out.is_ok());
        out
    }

    /// A deferred reference to the identified entity. Nothing is fetched
    /// until [`LazyRef::resolve`] runs.
    pub fn load(&self, id: &T::Key) -> OrmResult<LazyRef<T, S>> {
        Ok(LazyRef {
            session: Arc::clone(&self.session),
            entity_name: self.entity_name()?,
            id: id.clone(),
            _marker: PhantomData,
        })
    }

    /// Resolves many identities through a single criteria query with an
    /// `in` restriction. Empty input returns empty without issuing any
    /// query.
    pub async fn get_many(&self, ids: &[T::Key]) -> OrmResult<Vec<T>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let meta = self.meta()?;
        let values: Vec<Value> = ids.iter().map(ToValue::to_value).collect();
        let mut handle = self.session.criteria(&meta.entity_name).await?;
        handle.add_restriction(Restriction::in_list(meta.id_property, values));
        let out = self.collect_rows(&mut handle).await;
        obs("get_many", &meta.entity_name, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// All rows of the entity type, optionally ordered.
    pub async fn get_all(&self, orders: &[Order]) -> OrmResult<Vec<T>> {
        self.find_by_criteria(&[], orders).await
    }

    pub async fn find_by_criteria(
        &self,
        restrictions: &[Restriction],
        orders: &[Order],
    ) -> OrmResult<Vec<T>> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let mut handle = self.session.criteria(&name).await?;
        for restriction in restrictions {
            handle.add_restriction(restriction.clone());
        }
        for order in orders {
            handle.add_order(order.clone());
        }
        let out = self.collect_rows(&mut handle).await;
        obs("find_by_criteria", &name, start, len_or_zero(&out), out.is_ok());
        out
    }

    // --- entity-dialect queries ---------------------------------------

    /// Runs an entity-dialect query and maps every row into `X`, which
    /// may be the entity type itself or [`Row`] for raw access.
    pub async fn find_by_query<'a, X: FromRow>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<Vec<X>> {
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        let out = self.collect_rows(&mut handle).await;
        obs("find_by_query", T::ENTITY_NAME, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Windowed variant of [`find_by_query`](Self::find_by_query). A
    /// zero-limit window returns empty without touching the engine.
    pub async fn find_by_query_paged<'a, X: FromRow>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
        window: Window,
    ) -> OrmResult<Vec<X>> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        handle.window(window);
        let out = self.collect_rows(&mut handle).await;
        obs("find_by_query_paged", T::ENTITY_NAME, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// At most one result; more than one is an engine error.
    pub async fn find_unique_by_query<'a, X: FromRow>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<Option<X>> {
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        let out = match handle.unique().await {
            Ok(Some(row)) => X::from_row(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        };
        let rows = out.as_ref().map_or(0, |found| usize::from(found.is_some()));
        obs("find_unique_by_query", T::ENTITY_NAME, start, rows, out.is_ok());
        out
    }

    /// Projection variant: result rows carry exactly the shape's
    /// declared columns, coerced to their declared kinds.
    pub async fn find_by_query_as<'a, P: RowShape>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<Vec<P>> {
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        configure_projection::<P, _>(&mut handle);
        let out = self.collect_shapes(&mut handle).await;
        obs("find_by_query_as", T::ENTITY_NAME, start, len_or_zero(&out), out.is_ok());
        out
    }

    pub async fn find_by_query_paged_as<'a, P: RowShape>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
        window: Window,
    ) -> OrmResult<Vec<P>> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        configure_projection::<P, _>(&mut handle);
        handle.window(window);
        let out = self.collect_shapes(&mut handle).await;
        obs("find_by_query_paged_as", T::ENTITY_NAME, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Entity-dialect query with each distinct root entity reported
    /// once.
    pub async fn distinct<'a, X: FromRow>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<Vec<X>> {
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        handle.transform(RowTransform::DistinctRootEntity);
        let out = self.collect_rows(&mut handle).await;
        obs("distinct", T::ENTITY_NAME, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Bulk modify or delete by entity-dialect query; returns the
    /// affected row count.
    pub async fn execute_update<'a>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<u64> {
        let start = Instant::now();
        let mut handle = self.entity_query(source.into(), binding).await?;
        let out = handle.update_count().await;
        let rows = out.as_ref().map_or(0, |n| *n as usize);
        obs("execute_update", T::ENTITY_NAME, start, rows, out.is_ok());
        out
    }

    async fn entity_query(
        &self,
        source: QuerySource<'_>,
        binding: &Binding,
    ) -> OrmResult<S::Handle> {
        build_query(
            self.session.as_ref(),
            Dialect::Entity,
            source,
            binding,
            self.named_order,
        )
        .await
    }

    // --- counting -----------------------------------------------------

    /// Derives and runs the counting form of an entity-dialect query.
    /// Compilation, binding and execution failures all wrap the derived
    /// text so the failing query is visible.
    pub async fn count_by_query(&self, text: &str, binding: &Binding) -> OrmResult<i64> {
        self.count_with(Dialect::Entity, text, binding, "count_by_query")
            .await
    }

    /// Native-dialect twin of [`count_by_query`](Self::count_by_query).
    pub async fn count_by_sql(&self, text: &str, binding: &Binding) -> OrmResult<i64> {
        self.count_with(Dialect::Native, text, binding, "count_by_sql")
            .await
    }

    async fn count_with(
        &self,
        dialect: Dialect,
        text: &str,
        binding: &Binding,
        op: &str,
    ) -> OrmResult<i64> {
        let start = Instant::now();
        let derived = daokit_sql_builder::to_count_query(text);
        let out = match self.run_count(dialect, &derived, binding).await {
            Ok(n) => Ok(n),
            Err(source) => Err(OrmError::count(derived, source)),
        };
        obs(op, T::ENTITY_NAME, start, 1, out.is_ok());
        out
    }

    async fn run_count(
        &self,
        dialect: Dialect,
        derived: &str,
        binding: &Binding,
    ) -> OrmResult<i64> {
        let mut handle = build_query(
            self.session.as_ref(),
            dialect,
            QuerySource::Text(derived),
            binding,
            self.named_order,
        )
        .await?;
        let row = handle.unique().await?;
        match row.as_ref().and_then(Row::first) {
            None | Some(Value::Null) => Ok(0),
            Some(value) => i64::from_value(value).map_err(OrmError::mapping),
        }
    }

    /// Total rows of the entity type.
    pub async fn entity_count(&self) -> OrmResult<i64> {
        let name = self.entity_name()?;
        let text = daokit_sql_builder::from_clause(&name, DEFAULT_ALIAS);
        self.count_by_query(&text, &Binding::None).await
    }

    // --- native queries -----------------------------------------------

    /// Native query returning generic rows. `aliases` controls entity
    /// composition: entries register each alias, the explicit-but-empty
    /// states register this repository's entity, and
    /// [`SqlAliases::None`] leaves rows as alias-keyed mappings.
    pub async fn find_by_sql<'a>(
        &self,
        source: impl Into<QuerySource<'a>>,
        aliases: SqlAliases<'_>,
        binding: &Binding,
    ) -> OrmResult<Vec<Row>> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let mut handle = self.sql_query(source.into(), aliases, &name, binding).await?;
        if matches!(aliases, SqlAliases::None) {
            handle.transform(RowTransform::AliasEntityMap);
        }
        let out = self.collect_rows(&mut handle).await;
        obs("find_by_sql", &name, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Windowed native query. Registration follows `aliases`; the
    /// alias-map row transform of the unwindowed path is not applied.
    pub async fn find_by_sql_paged<'a>(
        &self,
        source: impl Into<QuerySource<'a>>,
        aliases: SqlAliases<'_>,
        binding: &Binding,
        window: Window,
    ) -> OrmResult<Vec<Row>> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let name = self.entity_name()?;
        let mut handle = self.sql_query(source.into(), aliases, &name, binding).await?;
        handle.window(window);
        let out = self.collect_rows(&mut handle).await;
        obs("find_by_sql_paged", &name, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Native query projected into a shape; the shape's typed scalars
    /// are registered alongside any entity registration.
    pub async fn find_by_sql_as<'a, P: RowShape>(
        &self,
        source: impl Into<QuerySource<'a>>,
        aliases: SqlAliases<'_>,
        binding: &Binding,
    ) -> OrmResult<Vec<P>> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let mut handle = self.sql_query(source.into(), aliases, &name, binding).await?;
        configure_projection::<P, _>(&mut handle);
        let out = self.collect_shapes(&mut handle).await;
        obs("find_by_sql_as", &name, start, len_or_zero(&out), out.is_ok());
        out
    }

    pub async fn find_by_sql_paged_as<'a, P: RowShape>(
        &self,
        source: impl Into<QuerySource<'a>>,
        aliases: SqlAliases<'_>,
        binding: &Binding,
        window: Window,
    ) -> OrmResult<Vec<P>> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let name = self.entity_name()?;
        let mut handle = self.sql_query(source.into(), aliases, &name, binding).await?;
        configure_projection::<P, _>(&mut handle);
        handle.window(window);
        let out = self.collect_shapes(&mut handle).await;
        obs("find_by_sql_paged_as", &name, start, len_or_zero(&out), out.is_ok());
        out
    }

    /// Unique native lookup; the row comes back as a generic alias-keyed
    /// mapping, never composed into entities.
    pub async fn find_unique_by_sql<'a>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<Option<Row>> {
        let start = Instant::now();
        let mut handle = build_query(
            self.session.as_ref(),
            Dialect::Native,
            source.into(),
            binding,
            self.named_order,
        )
        .await?;
        handle.transform(RowTransform::AliasEntityMap);
        let out = handle.unique().await;
        let rows = out.as_ref().map_or(0, |found| usize::from(found.is_some()));
        obs("find_unique_by_sql", T::ENTITY_NAME, start, rows, out.is_ok());
        out
    }

    /// Bulk modify or delete in the native dialect; returns the affected
    /// row count.
    pub async fn execute_sql_update<'a>(
        &self,
        source: impl Into<QuerySource<'a>>,
        binding: &Binding,
    ) -> OrmResult<u64> {
        let start = Instant::now();
        let mut handle = build_query(
            self.session.as_ref(),
            Dialect::Native,
            source.into(),
            binding,
            self.named_order,
        )
        .await?;
        let out = handle.update_count().await;
        let rows = out.as_ref().map_or(0, |n| *n as usize);
        obs("execute_sql_update", T::ENTITY_NAME, start, rows, out.is_ok());
        out
    }

    async fn sql_query(
        &self,
        source: QuerySource<'_>,
        aliases: SqlAliases<'_>,
        default_entity: &str,
        binding: &Binding,
    ) -> OrmResult<S::Handle> {
        build_sql_query(
            self.session.as_ref(),
            source,
            aliases,
            default_entity,
            binding,
            self.named_order,
        )
        .await
    }

    // --- session passthroughs -----------------------------------------

    /// Whether the entity is currently held by the session. Transient
    /// instances are never contained.
    pub async fn contains(&self, entity: &T) -> OrmResult<bool> {
        let Some(id) = entity.id() else {
            return Ok(false);
        };
        let name = self.entity_name()?;
        self.session.contains(&name, id.to_value()).await
    }

    /// Detaches the entity from the session. A no-op for transient
    /// instances.
    pub async fn evict(&self, entity: &T) -> OrmResult<()> {
        let Some(id) = entity.id() else {
            return Ok(());
        };
        let name = self.entity_name()?;
        self.session.evict(&name, id.to_value()).await
    }

    pub async fn clear(&self) -> OrmResult<()> {
        self.session.clear().await
    }

    pub async fn flush(&self) -> OrmResult<()> {
        self.session.flush().await
    }

    /// Re-reads the entity's current state, optionally under a lock
    /// forwarded verbatim to the engine. Transient instances are an
    /// error here.
    pub async fn refresh(&self, entity: &T, lock: Option<LockMode>) -> OrmResult<T> {
        let start = Instant::now();
        let name = self.entity_name()?;
        let out = match require_id(entity) {
            Ok(id) => match self.session.refresh(&name, id.to_value(), lock).await {
                Ok(row) => T::from_row(&row),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };
        obs("refresh", &name, start, 1, out.is_ok());
        out
    }

    pub async fn replicate(&self, entity: &T, mode: ReplicationMode) -> OrmResult<()> {
        let name = self.entity_name()?;
        self.session.replicate(&name, entity.to_row(), mode).await
    }

    /// Runs a closure against the raw connection underneath the session.
    pub async fn do_work(&self, work: Work<'_>) -> OrmResult<()> {
        self.session.do_work(work).await
    }
}
