use async_trait::async_trait;

use crate::query::{
    Dialect, EntityMeta, LockMode, Order, ReplicationMode, Restriction, RowTransform, Window,
};
use crate::row::Row;
use crate::value::{ScalarKind, Value};
use crate::OrmResult;

/// Raw connection surface handed to [`Session::do_work`] closures.
pub trait RawConnection: Send {
    fn execute(&mut self, sql: &str) -> OrmResult<u64>;
}

/// Unit of work run directly against the connection underneath the
/// session.
pub type Work<'a> = Box<dyn FnOnce(&mut dyn RawConnection) -> OrmResult<()> + Send + 'a>;

/// A compiled query: binding, configuration and execution.
///
/// Handles are produced by [`Session::query`] and [`Session::criteria`]
/// and are single-use in spirit; execution borrows mutably so state can
/// be validated against the accumulated configuration.
#[async_trait]
pub trait QueryHandle: Send {
    /// Distinct named parameters in declaration order. Empty for queries
    /// without named parameters and for criteria handles.
    fn named_parameters(&self) -> Vec<String>;

    fn bind_index(&mut self, index: usize, value: Value) -> OrmResult<()>;

    /// Binds by parameter name. Names the query does not declare are
    /// rejected, not ignored.
    fn bind_name(&mut self, name: &str, value: Value) -> OrmResult<()>;

    fn window(&mut self, window: Window);

    /// Registers a typed scalar column; once any scalar is registered,
    /// result rows carry exactly the registered columns, coerced.
    fn add_scalar(&mut self, column: &str, kind: ScalarKind);

    /// Registers a select alias as a mapped entity (native queries).
    fn add_entity(&mut self, alias: &str, entity: &str);

    fn transform(&mut self, transform: RowTransform);

    fn add_restriction(&mut self, restriction: Restriction);

    fn add_order(&mut self, order: Order);

    async fn rows(&mut self) -> OrmResult<Vec<Row>>;

    /// At most one row; more than one is an engine error.
    async fn unique(&mut self) -> OrmResult<Option<Row>>;

    /// Executes a mutating statement and reports the affected row count.
    async fn update_count(&mut self) -> OrmResult<u64>;
}

/// The storage engine seam. The repository is a stateless dispatcher
/// over this trait; every call is one awaited round trip with no
/// retries and no internal concurrency.
#[async_trait]
pub trait Session: Send + Sync {
    type Handle: QueryHandle;

    /// Compiles ad-hoc query text in the given dialect. Compilation
    /// failures surface here, before any execution.
    async fn query(&self, dialect: Dialect, text: &str) -> OrmResult<Self::Handle>;

    /// Opens a criteria query over a mapped entity.
    async fn criteria(&self, entity: &str) -> OrmResult<Self::Handle>;

    /// Resolves the text of a query registered under `name`, if any.
    fn named_query(&self, name: &str, dialect: Dialect) -> Option<String>;

    /// Authoritative mapping metadata for an entity.
    fn metadata(&self, entity: &str) -> OrmResult<EntityMeta>;

    /// Persists a new row and returns the generated identifier.
    async fn save(&self, entity: &str, row: Row) -> OrmResult<Value>;

    async fn update(&self, entity: &str, row: Row) -> OrmResult<()>;

    /// Saves or updates depending on identifier presence; returns the
    /// effective identifier either way.
    async fn save_or_update(&self, entity: &str, row: Row) -> OrmResult<Value>;

    /// Merges state and returns the managed copy.
    async fn merge(&self, entity: &str, row: Row) -> OrmResult<Row>;

    /// Persist with deferred-insert semantics: no identifier is reported
    /// back.
    async fn persist(&self, entity: &str, row: Row) -> OrmResult<()>;

    async fn delete(&self, entity: &str, id: Value) -> OrmResult<()>;

    async fn get(&self, entity: &str, id: Value) -> OrmResult<Option<Row>>;

    /// Re-reads current state, optionally under a lock; absent rows are
    /// an error here, unlike [`Session::get`].
    async fn refresh(&self, entity: &str, id: Value, lock: Option<LockMode>) -> OrmResult<Row>;

    async fn contains(&self, entity: &str, id: Value) -> OrmResult<bool>;

    async fn evict(&self, entity: &str, id: Value) -> OrmResult<()>;

    async fn clear(&self) -> OrmResult<()>;

    async fn flush(&self) -> OrmResult<()>;

    async fn replicate(&self, entity: &str, row: Row, mode: ReplicationMode) -> OrmResult<()>;

    /// Runs a closure against the raw connection.
    async fn do_work(&self, work: Work<'_>) -> OrmResult<()>;
}
