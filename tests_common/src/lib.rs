//! Common integration testing utilities: an in-memory [`Session`]
//! engine plus shared entity and projection fixtures.
//!
//! The engine keeps per-entity row tables behind an `Arc<Mutex<..>>` and
//! interprets a deliberately small query grammar, just enough to
//! exercise every repository operation:
//!
//! ```text
//! [select <list>] from <Entity> [<alias>] [where <p> = <term> [and ..]] [order by ..]
//! select count(<anything>) from <Entity> [<alias>] [where ..]
//! delete [from] <Entity> [<alias>] [where ..]
//! update <Entity> [<alias>] set <p> = <term> [, ..] [where ..]
//! ```
//!
//! Terms are named parameters (`:name`), positional parameters (`?`),
//! quoted strings, numbers, booleans or `null`. Every executed query is
//! recorded so tests can assert that an operation issued no query at
//! all.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use daokit::{Entity, Projection};
use daokit_core::{
    Dialect, Direction, EntityDef, EntityMeta, LockMode, Order, OrmError, OrmResult, QueryHandle,
    RawConnection, ReplicationMode, Restriction, Row, RowTransform, ScalarKind, Session,
    Value, Window, Work,
};

// --- fixtures ---------------------------------------------------------

/// Member account as the registration backend maps it.
#[derive(Entity, Clone, Debug, PartialEq)]
#[entity(name = "Member")]
pub struct Member {
    #[orm(id)]
    pub id: Option<i64>,
    pub name: String,
    pub phone: String,
    pub balance: Decimal,
    pub active: bool,
    pub status: i32,
    pub register_time: NaiveDateTime,
    pub last_login_ip: Option<String>,
}

/// Flat parent shape embedded by [`MemberSummary`].
#[derive(Projection, Clone, Debug, PartialEq)]
pub struct AuditColumns {
    pub register_time: NaiveDateTime,
    pub last_login_ip: Option<String>,
}

/// Projection over a member row: three direct columns plus the audit
/// parent's columns.
#[derive(Projection, Clone, Debug, PartialEq)]
pub struct MemberSummary {
    pub member_id: i64,
    pub name: String,
    pub balance: Decimal,
    #[projection(parent)]
    pub audit: AuditColumns,
}

pub fn ts(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").expect("fixture timestamp")
}

pub fn sample_member(name: &str) -> Member {
    Member {
        id: None,
        name: name.to_string(),
        phone: "13800138000".to_string(),
        balance: Decimal::new(10_000, 2),
        active: true,
        status: 0,
        register_time: ts("2009-06-01 08:30:00"),
        last_login_ip: None,
    }
}

/// A fresh engine with the [`Member`] entity registered.
pub fn member_session() -> Arc<MemorySession> {
    let session = MemorySession::new();
    session.register_entity_of::<Member>();
    Arc::new(session)
}

// --- engine state -----------------------------------------------------

#[derive(Default)]
struct EngineState {
    tables: HashMap<String, Vec<Row>>,
    metas: HashMap<String, EntityMeta>,
    named: HashMap<(String, Dialect), String>,
    /// Session cache membership, keyed by entity name and id display.
    context: HashSet<(String, String)>,
    executed: Vec<String>,
    /// Every alias registered through `add_entity`, across all handles.
    alias_entities: Vec<(String, String)>,
    /// Every transform requested through `transform`, across all handles.
    transform_log: Vec<RowTransform>,
    next_id: i64,
}

impl EngineState {
    fn meta(&self, entity: &str) -> OrmResult<EntityMeta> {
        self.metas
            .get(entity)
            .cloned()
            .ok_or_else(|| OrmError::storage_message(format!("unknown entity `{entity}`")))
    }

    fn find_index(&self, entity: &str, id_property: &str, id: &Value) -> Option<usize> {
        self.tables.get(entity).and_then(|rows| {
            rows.iter()
                .position(|row| row.get(id_property).is_some_and(|v| loose_eq(v, id)))
        })
    }
}

/// In-memory engine implementing the full session seam. Cloning shares
/// the underlying state.
#[derive(Clone, Default)]
pub struct MemorySession {
    state: Arc<Mutex<EngineState>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity(&self, meta: EntityMeta) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(meta.entity_name.clone()).or_default();
        state.metas.insert(meta.entity_name.clone(), meta);
    }

    pub fn register_entity_of<E: EntityDef>(&self) {
        self.register_entity(EntityMeta::new(E::ENTITY_NAME, E::ID_PROPERTY));
    }

    pub fn register_named_query(&self, name: &str, dialect: Dialect, text: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .named
            .insert((name.to_string(), dialect), text.to_string());
    }

    /// Snapshot of an entity's stored rows.
    pub fn rows_of(&self, entity: &str) -> Vec<Row> {
        let state = self.state.lock().unwrap();
        state.tables.get(entity).cloned().unwrap_or_default()
    }

    /// Everything executed so far, in order. Lifecycle calls are not
    /// queries and do not appear here.
    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    /// Alias registrations observed across all handles, in order.
    pub fn alias_registrations(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().alias_entities.clone()
    }

    /// Row transforms observed across all handles, in order.
    pub fn transforms(&self) -> Vec<RowTransform> {
        self.state.lock().unwrap().transform_log.clone()
    }

    /// Appends a row verbatim, bypassing identity assignment. Tests use
    /// this to shape tables the lifecycle API cannot produce.
    pub fn push_raw(&self, entity: &str, row: Row) {
        let mut state = self.state.lock().unwrap();
        state.tables.entry(entity.to_string()).or_default().push(row);
    }

    fn context_key(entity: &str, id: &Value) -> (String, String) {
        (entity.to_string(), id.display())
    }
}

struct MemoryRawConnection {
    state: Arc<Mutex<EngineState>>,
}

impl RawConnection for MemoryRawConnection {
    fn execute(&mut self, sql: &str) -> OrmResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.executed.push(sql.to_string());
        Ok(0)
    }
}

#[async_trait]
impl Session for MemorySession {
    type Handle = MemoryHandle;

    async fn query(&self, dialect: Dialect, text: &str) -> OrmResult<Self::Handle> {
        let _ = dialect;
        Ok(MemoryHandle::text(Arc::clone(&self.state), text))
    }

    async fn criteria(&self, entity: &str) -> OrmResult<Self::Handle> {
        let state = self.state.lock().unwrap();
        state.meta(entity)?;
        Ok(MemoryHandle::criteria(
            Arc::clone(&self.state),
            entity.to_string(),
        ))
    }

    fn named_query(&self, name: &str, dialect: Dialect) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.named.get(&(name.to_string(), dialect)).cloned()
    }

    fn metadata(&self, entity: &str) -> OrmResult<EntityMeta> {
        self.state.lock().unwrap().meta(entity)
    }

    async fn save(&self, entity: &str, row: Row) -> OrmResult<Value> {
        let mut state = self.state.lock().unwrap();
        let meta = state.meta(entity)?;
        state.next_id += 1;
        let id = Value::BigInt(state.next_id);
        let mut stored = row;
        stored.set(meta.id_property, id.clone());
        state
            .tables
            .entry(entity.to_string())
            .or_default()
            .push(stored);
        let key = Self::context_key(entity, &id);
        state.context.insert(key);
        Ok(id)
    }

    async fn update(&self, entity: &str, row: Row) -> OrmResult<()> {
        let mut state = self.state.lock().unwrap();
        let meta = state.meta(entity)?;
        let id = row
            .get(&meta.id_property)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                OrmError::storage_message(format!("cannot update a transient `{entity}` row"))
            })?;
        let index = state
            .find_index(entity, &meta.id_property, &id)
            .ok_or_else(|| {
                OrmError::storage_message(format!(
                    "no `{entity}` row with id `{}`",
                    id.display()
                ))
            })?;
        if let Some(rows) = state.tables.get_mut(entity) {
            rows[index] = row;
        }
        Ok(())
    }

    async fn save_or_update(&self, entity: &str, row: Row) -> OrmResult<Value> {
        let has_id = {
            let state = self.state.lock().unwrap();
            let meta = state.meta(entity)?;
            row.get(&meta.id_property)
                .filter(|v| !v.is_null())
                .cloned()
        };
        match has_id {
            Some(id) => {
                self.update(entity, row).await?;
                Ok(id)
            }
            None => self.save(entity, row).await,
        }
    }

    async fn merge(&self, entity: &str, row: Row) -> OrmResult<Row> {
        let id = self.save_or_update(entity, row).await?;
        let merged = self.get(entity, id.clone()).await?;
        merged.ok_or_else(|| {
            OrmError::storage_message(format!(
                "merged `{entity}` row with id `{}` is gone",
                id.display()
            ))
        })
    }

    async fn persist(&self, entity: &str, row: Row) -> OrmResult<()> {
        self.save(entity, row).await.map(|_| ())
    }

    async fn delete(&self, entity: &str, id: Value) -> OrmResult<()> {
        let mut state = self.state.lock().unwrap();
        let meta = state.meta(entity)?;
        let index = state
            .find_index(entity, &meta.id_property, &id)
            .ok_or_else(|| {
                OrmError::storage_message(format!(
                    "no `{entity}` row with id `{}`",
                    id.display()
                ))
            })?;
        if let Some(rows) = state.tables.get_mut(entity) {
            rows.remove(index);
        }
        let key = Self::context_key(entity, &id);
        state.context.remove(&key);
        Ok(())
    }

    async fn get(&self, entity: &str, id: Value) -> OrmResult<Option<Row>> {
        let mut state = self.state.lock().unwrap();
        let meta = state.meta(entity)?;
        let found = state
            .find_index(entity, &meta.id_property, &id)
            .and_then(|index| state.tables.get(entity).map(|rows| rows[index].clone()));
        if found.is_some() {
            let key = Self::context_key(entity, &id);
            state.context.insert(key);
        }
        Ok(found)
    }

    async fn refresh(&self, entity: &str, id: Value, lock: Option<LockMode>) -> OrmResult<Row> {
        let _ = lock;
        self.get(entity, id.clone()).await?.ok_or_else(|| {
            OrmError::storage_message(format!(
                "cannot refresh `{entity}` row with id `{}`",
                id.display()
            ))
        })
    }

    async fn contains(&self, entity: &str, id: Value) -> OrmResult<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.context.contains(&Self::context_key(entity, &id)))
    }

    async fn evict(&self, entity: &str, id: Value) -> OrmResult<()> {
        let mut state = self.state.lock().unwrap();
        state.context.remove(&Self::context_key(entity, &id));
        Ok(())
    }

    async fn clear(&self) -> OrmResult<()> {
        let mut state = self.state.lock().unwrap();
        state.context.clear();
        Ok(())
    }

    async fn flush(&self) -> OrmResult<()> {
        Ok(())
    }

    async fn replicate(&self, entity: &str, row: Row, mode: ReplicationMode) -> OrmResult<()> {
        let mut state = self.state.lock().unwrap();
        let meta = state.meta(entity)?;
        let id = row
            .get(&meta.id_property)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| {
                OrmError::storage_message(format!(
                    "cannot replicate a `{entity}` row without an identifier"
                ))
            })?;
        let existing = state.find_index(entity, &meta.id_property, &id);
        match (existing, mode) {
            (Some(_), ReplicationMode::Ignore) => Ok(()),
            (Some(_), ReplicationMode::Exception) => Err(OrmError::storage_message(format!(
                "`{entity}` row with id `{}` already exists",
                id.display()
            ))),
            (Some(index), _) => {
                if let Some(rows) = state.tables.get_mut(entity) {
                    rows[index] = row;
                }
                Ok(())
            }
            (None, _) => {
                state.tables.entry(entity.to_string()).or_default().push(row);
                Ok(())
            }
        }
    }

    async fn do_work(&self, work: Work<'_>) -> OrmResult<()> {
        let mut conn = MemoryRawConnection {
            state: Arc::clone(&self.state),
        };
        work(&mut conn)
    }
}

// --- query handle -----------------------------------------------------

enum HandleSource {
    Text(String),
    Criteria(String),
}

/// Compiled query against the in-memory engine. Configuration is
/// recorded as-is and interpreted at execution time.
pub struct MemoryHandle {
    state: Arc<Mutex<EngineState>>,
    source: HandleSource,
    named_params: Vec<String>,
    by_name: HashMap<String, Value>,
    by_index: HashMap<usize, Value>,
    window: Option<Window>,
    scalars: Vec<(String, ScalarKind)>,
    entities: Vec<(String, String)>,
    transforms: Vec<RowTransform>,
    restrictions: Vec<Restriction>,
    orders: Vec<Order>,
}

impl MemoryHandle {
    fn text(state: Arc<Mutex<EngineState>>, text: &str) -> Self {
        Self {
            state,
            named_params: scan_named_params(text),
            source: HandleSource::Text(text.to_string()),
            by_name: HashMap::new(),
            by_index: HashMap::new(),
            window: None,
            scalars: Vec::new(),
            entities: Vec::new(),
            transforms: Vec::new(),
            restrictions: Vec::new(),
            orders: Vec::new(),
        }
    }

    fn criteria(state: Arc<Mutex<EngineState>>, entity: String) -> Self {
        Self {
            state,
            source: HandleSource::Criteria(entity),
            named_params: Vec::new(),
            by_name: HashMap::new(),
            by_index: HashMap::new(),
            window: None,
            scalars: Vec::new(),
            entities: Vec::new(),
            transforms: Vec::new(),
            restrictions: Vec::new(),
            orders: Vec::new(),
        }
    }

    fn run_select(&self) -> OrmResult<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        let (entity, mut rows) = match &self.source {
            HandleSource::Text(text) => {
                state.executed.push(text.clone());
                select_rows(&state, text, &self.by_name, &self.by_index)?
            }
            HandleSource::Criteria(entity) => {
                state.executed.push(format!("criteria {entity}"));
                criteria_rows(&state, entity, &self.restrictions, &self.orders)?
            }
        };
        if self.transforms.contains(&RowTransform::DistinctRootEntity) {
            if let Ok(meta) = state.meta(&entity) {
                dedup_by_property(&mut rows, &meta.id_property);
            }
        }
        if !self.scalars.is_empty() {
            rows = project_scalars(rows, &self.scalars)?;
        }
        if let Some(window) = self.window {
            rows = rows
                .into_iter()
                .skip(window.offset)
                .take(window.limit)
                .collect();
        }
        Ok(rows)
    }

    fn run_update(&self) -> OrmResult<u64> {
        let mut state = self.state.lock().unwrap();
        let text = match &self.source {
            HandleSource::Text(text) => text.clone(),
            HandleSource::Criteria(_) => {
                return Err(OrmError::storage_message(
                    "criteria handles cannot execute update statements",
                ))
            }
        };
        state.executed.push(text.clone());
        execute_statement(&mut state, &text, &self.by_name, &self.by_index)
    }
}

#[async_trait]
impl QueryHandle for MemoryHandle {
    fn named_parameters(&self) -> Vec<String> {
        self.named_params.clone()
    }

    fn bind_index(&mut self, index: usize, value: Value) -> OrmResult<()> {
        self.by_index.insert(index, value);
        Ok(())
    }

    fn bind_name(&mut self, name: &str, value: Value) -> OrmResult<()> {
        if !self.named_params.iter().any(|p| p == name) {
            return Err(OrmError::binding(format!("unknown parameter `:{name}`")));
        }
        self.by_name.insert(name.to_string(), value);
        Ok(())
    }

    fn window(&mut self, window: Window) {
        self.window = Some(window);
    }

    fn add_scalar(&mut self, column: &str, kind: ScalarKind) {
        self.scalars.push((column.to_string(), kind));
    }

    fn add_entity(&mut self, alias: &str, entity: &str) {
        self.entities.push((alias.to_string(), entity.to_string()));
        let mut state = self.state.lock().unwrap();
        state
            .alias_entities
            .push((alias.to_string(), entity.to_string()));
    }

    fn transform(&mut self, transform: RowTransform) {
        self.transforms.push(transform);
        self.state.lock().unwrap().transform_log.push(transform);
    }

    fn add_restriction(&mut self, restriction: Restriction) {
        self.restrictions.push(restriction);
    }

    fn add_order(&mut self, order: Order) {
        self.orders.push(order);
    }

    async fn rows(&mut self) -> OrmResult<Vec<Row>> {
        self.run_select()
    }

    async fn unique(&mut self) -> OrmResult<Option<Row>> {
        let mut rows = self.run_select()?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(Some(rows.remove(0))),
            n => Err(OrmError::storage_message(format!(
                "query returned {n} rows where at most one was expected"
            ))),
        }
    }

    async fn update_count(&mut self) -> OrmResult<u64> {
        self.run_update()
    }
}

// --- the interpreter --------------------------------------------------

fn named_param_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("pattern compiles"))
}

fn count_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^select\s+count\(([^)]*)\)\s+(from\b.*)$").expect("pattern compiles")
    })
}

fn order_split_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^(.*?)\border\s+by\s+(.*)$").expect("pattern compiles")
    })
}

fn select_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^(?:select\s+(?P<list>.*?)\s+)?from\s+(?P<entity>[A-Za-z_][A-Za-z0-9_]*)(?:\s+(?P<alias>[A-Za-z_][A-Za-z0-9_]*))?(?:\s+where\s+(?P<cond>.*?))?\s*$",
        )
        .expect("pattern compiles")
    })
}

fn delete_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^delete\s+(?:from\s+)?(?P<entity>[A-Za-z_][A-Za-z0-9_]*)(?:\s+(?P<alias>[A-Za-z_][A-Za-z0-9_]*))?(?:\s+where\s+(?P<cond>.*?))?\s*$",
        )
        .expect("pattern compiles")
    })
}

fn update_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)^update\s+(?P<entity>[A-Za-z_][A-Za-z0-9_]*)(?:\s+(?P<alias>[A-Za-z_][A-Za-z0-9_]*))?\s+set\s+(?P<sets>.*?)(?:\s+where\s+(?P<cond>.*?))?\s*$",
        )
        .expect("pattern compiles")
    })
}

fn select_item_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?P<expr>\S+)(?:\s+as\s+(?P<alias>[A-Za-z_][A-Za-z0-9_]*))?\s*$")
            .expect("pattern compiles")
    })
}

fn scan_named_params(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in named_param_pattern().captures_iter(text) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

fn strip_alias(property: &str) -> &str {
    property.rsplit('.').next().unwrap_or(property)
}

/// Resolves one term of the grammar into a concrete value. The cursor
/// numbers positional markers by occurrence.
fn resolve_term(
    term: &str,
    by_name: &HashMap<String, Value>,
    by_index: &HashMap<usize, Value>,
    cursor: &mut usize,
) -> OrmResult<Value> {
    let term = term.trim();
    if let Some(name) = term.strip_prefix(':') {
        return by_name.get(name).cloned().ok_or_else(|| {
            OrmError::binding(format!("parameter `:{name}` is not set"))
        });
    }
    if term == "?" {
        let index = *cursor;
        *cursor += 1;
        return by_index.get(&index).cloned().ok_or_else(|| {
            OrmError::binding(format!("positional parameter {index} is not set"))
        });
    }
    Ok(literal_value(term))
}

fn literal_value(term: &str) -> Value {
    if term.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if term.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if term.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if term.len() >= 2 && term.starts_with('\'') && term.ends_with('\'') {
        return Value::Text(term[1..term.len() - 1].to_string());
    }
    if let Ok(n) = term.parse::<i64>() {
        return Value::BigInt(n);
    }
    if let Ok(f) = term.parse::<f64>() {
        return Value::Double(f);
    }
    Value::Text(term.to_string())
}

fn parse_conditions(
    cond: Option<&str>,
    by_name: &HashMap<String, Value>,
    by_index: &HashMap<usize, Value>,
    cursor: &mut usize,
) -> OrmResult<Vec<(String, Value)>> {
    let Some(cond) = cond else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    let splitter = {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?i)\s+and\s+").expect("pattern compiles"))
    };
    for part in splitter.split(cond) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (property, term) = part.split_once('=').ok_or_else(|| {
            OrmError::storage_message(format!("cannot parse condition `{part}`"))
        })?;
        let value = resolve_term(term, by_name, by_index, cursor)?;
        out.push((strip_alias(property.trim()).to_string(), value));
    }
    Ok(out)
}

fn matches_conditions(row: &Row, conditions: &[(String, Value)]) -> bool {
    conditions.iter().all(|(property, wanted)| {
        row.get(property).is_some_and(|actual| loose_eq(actual, wanted))
    })
}

fn parse_orders(tail: &str) -> Vec<Order> {
    tail.split(',')
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            let mut words = item.split_whitespace();
            let property = strip_alias(words.next()?).to_string();
            let desc = words
                .next()
                .is_some_and(|word| word.eq_ignore_ascii_case("desc"));
            Some(if desc {
                Order::desc(property)
            } else {
                Order::asc(property)
            })
        })
        .collect()
}

fn apply_orders(rows: &mut [Row], orders: &[Order]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in orders {
            let left = a.get(&order.property);
            let right = b.get(&order.property);
            let mut ordering = cmp_values(left, right);
            if order.direction == Direction::Desc {
                ordering = ordering.reverse();
            }
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn numeric(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::BigInt(i) => Some(Decimal::from(*i)),
        Value::Double(f) => Decimal::from_f64(*f),
        Value::Decimal(d) => Some(*d),
        Value::Bool(b) => Some(Decimal::from(u8::from(*b))),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Equality across representations: numeric forms compare by value,
/// everything else by display text. Nulls equal only each other.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    if a.is_null() || b.is_null() {
        return a.is_null() && b.is_null();
    }
    if a == b {
        return true;
    }
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.display() == b.display(),
    }
}

fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (None, None) => std::cmp::Ordering::Equal,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a.display().cmp(&b.display()),
        },
    }
}

fn dedup_by_property(rows: &mut Vec<Row>, property: &str) {
    let mut seen = HashSet::new();
    rows.retain(|row| {
        let key = row.get(property).map(Value::display).unwrap_or_default();
        seen.insert(key)
    });
}

fn project_scalars(rows: Vec<Row>, scalars: &[(String, ScalarKind)]) -> OrmResult<Vec<Row>> {
    rows.into_iter()
        .map(|row| {
            let mut projected = Row::with_capacity(scalars.len());
            for (column, kind) in scalars {
                let value = row.get(column).ok_or_else(|| {
                    OrmError::mapping_message(format!("no column `{column}` in result row"))
                })?;
                projected.set(column.clone(), kind.coerce(value).map_err(OrmError::mapping)?);
            }
            Ok(projected)
        })
        .collect()
}

fn project_list(row: &Row, list: &str) -> OrmResult<Row> {
    if list.trim() == "*" {
        return Ok(row.clone());
    }
    let mut projected = Row::new();
    for item in list.split(',') {
        let caps = select_item_pattern().captures(item).ok_or_else(|| {
            OrmError::storage_message(format!("cannot parse select item `{item}`"))
        })?;
        let expr = caps.name("expr").map(|m| m.as_str()).unwrap_or_default();
        let source = strip_alias(expr);
        let column = caps
            .name("alias")
            .map(|m| m.as_str())
            .unwrap_or(source);
        let value = row.get(source).cloned().unwrap_or(Value::Null);
        projected.set(column, value);
    }
    Ok(projected)
}

fn select_rows(
    state: &EngineState,
    text: &str,
    by_name: &HashMap<String, Value>,
    by_index: &HashMap<usize, Value>,
) -> OrmResult<(String, Vec<Row>)> {
    let trimmed = text.trim();
    if let Some(caps) = count_pattern().captures(trimmed) {
        let base = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let (entity, rows) = select_rows(state, base, by_name, by_index)?;
        let mut row = Row::new();
        row.set("count", Value::BigInt(rows.len() as i64));
        return Ok((entity, vec![row]));
    }

    let (core, text_orders) = match order_split_pattern().captures(trimmed) {
        Some(caps) => {
            let core = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let tail = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (core.to_string(), parse_orders(tail))
        }
        None => (trimmed.to_string(), Vec::new()),
    };

    let caps = select_pattern().captures(&core).ok_or_else(|| {
        OrmError::storage_message(format!("cannot parse query `{text}`"))
    })?;
    let entity = caps.name("entity").map(|m| m.as_str()).unwrap_or_default();
    let table = state
        .tables
        .get(entity)
        .ok_or_else(|| OrmError::storage_message(format!("unknown entity `{entity}`")))?;

    let mut cursor = 0usize;
    let conditions = parse_conditions(
        caps.name("cond").map(|m| m.as_str()),
        by_name,
        by_index,
        &mut cursor,
    )?;

    let mut rows: Vec<Row> = table
        .iter()
        .filter(|row| matches_conditions(row, &conditions))
        .cloned()
        .collect();
    apply_orders(&mut rows, &text_orders);

    if let Some(list) = caps.name("list") {
        rows = rows
            .iter()
            .map(|row| project_list(row, list.as_str()))
            .collect::<OrmResult<Vec<Row>>>()?;
    }
    Ok((entity.to_string(), rows))
}

fn criteria_rows(
    state: &EngineState,
    entity: &str,
    restrictions: &[Restriction],
    orders: &[Order],
) -> OrmResult<(String, Vec<Row>)> {
    let table = state
        .tables
        .get(entity)
        .ok_or_else(|| OrmError::storage_message(format!("unknown entity `{entity}`")))?;
    let mut rows: Vec<Row> = table
        .iter()
        .filter(|row| {
            restrictions.iter().all(|restriction| match restriction {
                Restriction::Eq { property, value } => row
                    .get(property)
                    .is_some_and(|actual| loose_eq(actual, value)),
                Restriction::In { property, values } => row.get(property).is_some_and(|actual| {
                    values.iter().any(|value| loose_eq(actual, value))
                }),
            })
        })
        .cloned()
        .collect();
    apply_orders(&mut rows, orders);
    Ok((entity.to_string(), rows))
}

fn execute_statement(
    state: &mut EngineState,
    text: &str,
    by_name: &HashMap<String, Value>,
    by_index: &HashMap<usize, Value>,
) -> OrmResult<u64> {
    let trimmed = text.trim();
    if let Some(caps) = delete_pattern().captures(trimmed) {
        let entity = caps.name("entity").map(|m| m.as_str()).unwrap_or_default();
        let mut cursor = 0usize;
        let conditions = parse_conditions(
            caps.name("cond").map(|m| m.as_str()),
            by_name,
            by_index,
            &mut cursor,
        )?;
        let table = state.tables.get_mut(entity).ok_or_else(|| {
            OrmError::storage_message(format!("unknown entity `{entity}`"))
        })?;
        let before = table.len();
        table.retain(|row| !matches_conditions(row, &conditions));
        return Ok((before - table.len()) as u64);
    }
    if let Some(caps) = update_pattern().captures(trimmed) {
        let entity = caps.name("entity").map(|m| m.as_str()).unwrap_or_default();
        let mut cursor = 0usize;
        let mut sets = Vec::new();
        for item in caps
            .name("sets")
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split(',')
        {
            let (property, term) = item.split_once('=').ok_or_else(|| {
                OrmError::storage_message(format!("cannot parse assignment `{item}`"))
            })?;
            let value = resolve_term(term, by_name, by_index, &mut cursor)?;
            sets.push((strip_alias(property.trim()).to_string(), value));
        }
        let conditions = parse_conditions(
            caps.name("cond").map(|m| m.as_str()),
            by_name,
            by_index,
            &mut cursor,
        )?;
        let table = state.tables.get_mut(entity).ok_or_else(|| {
            OrmError::storage_message(format!("unknown entity `{entity}`"))
        })?;
        let mut touched = 0u64;
        for row in table.iter_mut() {
            if matches_conditions(row, &conditions) {
                for (property, value) in &sets {
                    row.set(property.clone(), value.clone());
                }
                touched += 1;
            }
        }
        return Ok(touched);
    }
    Err(OrmError::storage_message(format!(
        "unsupported update statement `{text}`"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use daokit_core::ToRow;

    fn seeded() -> Arc<MemorySession> {
        member_session()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_assigns_identifiers_and_get_finds_them() -> OrmResult<()> {
        let session = seeded();
        let id = session.save("Member", sample_member("ada").to_row()).await?;
        assert_eq!(id, Value::BigInt(1));
        let row = session.get("Member", id).await?.expect("stored row");
        assert_eq!(row.get("name"), Some(&Value::Text("ada".into())));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn where_clause_filters_and_order_by_sorts() -> OrmResult<()> {
        let session = seeded();
        for (name, status) in [("ada", 1), ("grace", 2), ("linus", 1)] {
            let mut member = sample_member(name);
            member.status = status;
            session.save("Member", member.to_row()).await?;
        }
        let mut handle = session
            .query(
                Dialect::Entity,
                "from Member m where m.status = :s order by m.name desc",
            )
            .await?;
        handle.bind_name("s", Value::Int(1))?;
        let rows = handle.rows().await?;
        let names: Vec<_> = rows
            .iter()
            .map(|row| row.get("name").cloned())
            .collect();
        assert_eq!(
            names,
            vec![
                Some(Value::Text("linus".into())),
                Some(Value::Text("ada".into()))
            ]
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn count_queries_come_back_as_a_single_scalar_row() -> OrmResult<()> {
        let session = seeded();
        for name in ["ada", "grace"] {
            session.save("Member", sample_member(name).to_row()).await?;
        }
        let mut handle = session
            .query(Dialect::Entity, "select count(*) from Member X")
            .await?;
        let row = handle.unique().await?.expect("count row");
        assert_eq!(row.first(), Some(&Value::BigInt(2)));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_bind_names_are_rejected() -> OrmResult<()> {
        let session = seeded();
        let mut handle = session
            .query(Dialect::Entity, "from Member m where m.status = :s")
            .await?;
        let err = handle
            .bind_name("nope", Value::Int(1))
            .expect_err("unknown name");
        assert!(matches!(err, OrmError::BindingMismatch { .. }));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unset_parameters_fail_at_execution() -> OrmResult<()> {
        let session = seeded();
        let mut handle = session
            .query(Dialect::Entity, "from Member m where m.status = :s")
            .await?;
        let err = handle.rows().await.expect_err("unset parameter");
        assert!(matches!(err, OrmError::BindingMismatch { .. }));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn delete_statements_report_affected_rows() -> OrmResult<()> {
        let session = seeded();
        for (name, status) in [("ada", 1), ("grace", 2)] {
            let mut member = sample_member(name);
            member.status = status;
            session.save("Member", member.to_row()).await?;
        }
        let mut handle = session
            .query(Dialect::Entity, "delete from Member m where m.status = ?")
            .await?;
        handle.bind_index(0, Value::Int(2))?;
        assert_eq!(handle.update_count().await?, 1);
        assert_eq!(session.rows_of("Member").len(), 1);
        Ok(())
    }

    #[test]
    fn named_parameters_are_scanned_distinct_in_declaration_order() {
        assert_eq!(
            scan_named_params("from M where a = :x and b = :y and c = :x"),
            vec!["x".to_string(), "y".to_string()]
        );
    }

    #[test]
    fn metadata_is_an_error_for_unknown_entities() {
        let session = MemorySession::new();
        assert!(session.metadata("Ghost").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn executed_log_records_query_texts() -> OrmResult<()> {
        let session = seeded();
        let mut handle = session.query(Dialect::Entity, "from Member X").await?;
        let _ = handle.rows().await?;
        assert_eq!(session.executed(), vec!["from Member X".to_string()]);
        Ok(())
    }

    #[test]
    fn loose_eq_spans_numeric_representations() {
        assert!(loose_eq(&Value::Int(1), &Value::BigInt(1)));
        assert!(loose_eq(&Value::Text("2".into()), &Value::Int(2)));
        assert!(loose_eq(
            &Value::Decimal(Decimal::new(100, 2)),
            &Value::Double(1.0)
        ));
        assert!(!loose_eq(&Value::Null, &Value::Int(0)));
        assert!(loose_eq(&Value::Null, &Value::Null));
    }
}
