#![forbid(unsafe_code)]
//! Core abstractions for the daokit repository framework: engine-neutral
//! values and rows, the query model, the asynchronous session seam, and
//! the entity and projection traits the derive macros implement.
//!
//! Nothing in this crate talks to storage. Concrete engines implement
//! [`Session`] and [`QueryHandle`]; the facade crate builds the generic
//! repository on top.

pub use async_trait::async_trait;

mod query;
mod row;
mod session;
mod value;

pub use query::{
    Binding, Dialect, Direction, EntityMeta, LockMode, NamedOrder, Order, QuerySource,
    ReplicationMode, Restriction, RowTransform, SqlAliases, Window,
};
pub use row::{row_field, row_field_opt, Row};
pub use session::{QueryHandle, RawConnection, Session, Work};
pub use value::{CoerceError, FromValue, KeyValue, ScalarKind, ToValue, Value};

/// Errors surfaced by repository operations. Failures propagate
/// immediately; nothing in this stack retries.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Query text or name was empty or whitespace-only; raised before
    /// the engine is touched.
    #[error("query text must not be blank")]
    EmptyQuery,

    /// Parameters did not line up with what the query declares.
    #[error("parameter binding mismatch: {reason}")]
    BindingMismatch { reason: String },

    /// A derived count query could not be compiled or executed. The
    /// message carries the derived text so the failing query is visible.
    #[error("count query failed: {query}")]
    CountDerivation {
        query: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A row could not be materialized into the requested shape or
    /// entity.
    #[error("row mapping failed: {source}")]
    Mapping {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The storage engine reported a failure, or the repository was
    /// misconfigured in a way only the engine can reveal.
    #[error("storage error: {source}")]
    Storage {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl OrmError {
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OrmError::Storage {
            source: Box::new(source),
        }
    }

    pub fn mapping<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OrmError::Mapping {
            source: Box::new(source),
        }
    }

    pub fn binding(reason: impl Into<String>) -> Self {
        OrmError::BindingMismatch {
            reason: reason.into(),
        }
    }

    pub fn count<E>(query: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OrmError::CountDerivation {
            query: query.into(),
            source: Box::new(source),
        }
    }

    pub fn storage_message(message: impl Into<String>) -> Self {
        Self::storage(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.into(),
        ))
    }

    pub fn mapping_message(message: impl Into<String>) -> Self {
        Self::mapping(std::io::Error::new(
            std::io::ErrorKind::Other,
            message.into(),
        ))
    }
}

pub type OrmResult<T> = Result<T, OrmError>;

/// Static mapping facts about an entity type.
///
/// The engine's [`Session::metadata`] remains authoritative; these
/// constants seed queries and registration.
pub trait EntityDef {
    /// Mapped entity name used in query text and engine lookups.
    const ENTITY_NAME: &'static str;
    /// Name of the identifier property.
    const ID_PROPERTY: &'static str;
    /// All mapped property names, identifier included, in declaration
    /// order.
    const PROPERTIES: &'static [&'static str];
}

/// Identifier access for persisted and transient entities.
pub trait HasId: EntityDef {
    type Key: KeyValue;

    /// `None` for transient instances that have not been assigned an
    /// identity yet.
    fn id(&self) -> Option<Self::Key>;
}

/// Conversion into the engine row representation.
pub trait ToRow {
    fn to_row(&self) -> Row;
}

/// Materialization from an engine row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> OrmResult<Self>;
}

// Identity mapping so generic find operations can return raw rows.
impl FromRow for Row {
    fn from_row(row: &Row) -> OrmResult<Self> {
        Ok(row.clone())
    }
}

/// A single projected column: its alias and the semantic kind values are
/// coerced through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeField {
    pub name: &'static str,
    pub kind: ScalarKind,
}

/// An arbitrary projection target for query results.
///
/// `fields()` lists the shape's own columns plus, when a parent shape is
/// embedded, the parent's own columns. Exactly one level: parents of
/// parents are never walked, so a parent shape should itself be flat.
pub trait RowShape: Sized {
    /// Columns declared directly on this shape.
    const DIRECT_FIELDS: &'static [ShapeField];

    /// All projected columns, built once per shape and cached.
    fn fields() -> &'static [ShapeField];

    fn from_projected(row: &Row) -> OrmResult<Self>;
}

/// Marks rows deleted by updating a state property instead of removing
/// them.
///
/// The marker literal is coerced into its target kind when the policy is
/// constructed, so a bad literal fails before any entity is touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SoftDelete {
    property: String,
    marker: Value,
}

impl SoftDelete {
    pub fn new(
        property: impl Into<String>,
        literal: &str,
        kind: ScalarKind,
    ) -> Result<Self, CoerceError> {
        Ok(Self {
            property: property.into(),
            marker: kind.parse_literal(literal)?,
        })
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn marker(&self) -> &Value {
        &self.marker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_delete_resolves_marker_at_construction() {
        let policy = SoftDelete::new("status", "-1", ScalarKind::Int).unwrap();
        assert_eq!(policy.property(), "status");
        assert_eq!(policy.marker(), &Value::Int(-1));
    }

    #[test]
    fn soft_delete_rejects_bad_literal_up_front() {
        assert!(SoftDelete::new("status", "tomorrow", ScalarKind::Int).is_err());
    }

    #[test]
    fn row_is_its_own_from_row_identity() {
        let mut row = Row::new();
        row.set("a", Value::Int(1));
        let copy = Row::from_row(&row).unwrap();
        assert_eq!(copy, row);
    }

    #[test]
    fn error_helpers_pick_the_right_variant() {
        assert!(matches!(
            OrmError::binding("2 values for 3 parameters"),
            OrmError::BindingMismatch { .. }
        ));
        assert!(matches!(
            OrmError::storage_message("unknown entity"),
            OrmError::Storage { .. }
        ));
        assert!(matches!(
            OrmError::mapping_message("missing column"),
            OrmError::Mapping { .. }
        ));
    }

    #[test]
    fn count_error_display_carries_derived_text() {
        let err = OrmError::count(
            "select count(*) from Member X ",
            OrmError::storage_message("boom"),
        );
        assert!(err.to_string().contains("select count(*) from Member X"));
    }

    #[test]
    fn manual_entity_defs_expose_metadata() {
        struct Invoice;
        impl EntityDef for Invoice {
            const ENTITY_NAME: &'static str = "Invoice";
            const ID_PROPERTY: &'static str = "id";
            const PROPERTIES: &'static [&'static str] = &["id", "total"];
        }
        assert_eq!(Invoice::ENTITY_NAME, "Invoice");
        assert_eq!(Invoice::ID_PROPERTY, "id");
        assert_eq!(Invoice::PROPERTIES, &["id", "total"]);
    }
}
