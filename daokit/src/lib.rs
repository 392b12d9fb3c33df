#![forbid(unsafe_code)]
//! Facade crate for the daokit data-access library.
//!
//! This crate provides the main public API: the [`GenericRepository`],
//! the parameter binder and query builder it is composed from, and
//! re-exports of the core traits and derive macros so applications only
//! add this single crate as a dependency.
//!
//! # Example: Deriving `Entity`
//!
//! The `#[derive(Entity)]` macro generates mapping metadata plus row
//! conversion both ways.
//! ```
//! use daokit::{Entity, EntityDef};
//!
//! #[derive(Entity, Clone, Debug, PartialEq)]
//! #[entity(name = "MemberAccount")]
//! pub struct Member {
//!     #[orm(id)]
//!     pub id: Option<i64>,
//!     #[orm(property = "loginName")]
//!     pub name: String,
//! }
//!
//! assert_eq!(Member::ENTITY_NAME, "MemberAccount");
//! assert_eq!(Member::ID_PROPERTY, "id");
//! assert_eq!(Member::PROPERTIES, &["id", "loginName"]);
//! ```
//!
//! # Example: Deriving `Projection`
//!
//! Projections classify every field by its declared type and register
//! typed scalar columns for it on the query.
//! ```
//! use daokit::{Projection, RowShape, ScalarKind};
//!
//! #[derive(Projection, Debug)]
//! pub struct MemberSummary {
//!     pub member_id: i64,
//!     pub name: String,
//! }
//!
//! assert_eq!(MemberSummary::fields()[0].kind, ScalarKind::BigInt);
//! assert_eq!(MemberSummary::fields()[1].kind, ScalarKind::Text);
//! ```

pub mod bind;
pub mod query;
pub mod repository;

// Re-export the core types and traits.
pub use daokit_core::{
    async_trait, row_field, row_field_opt, Binding, CoerceError, Dialect, Direction, EntityDef,
    EntityMeta, FromRow, FromValue, HasId, KeyValue, LockMode, NamedOrder, Order, OrmError,
    OrmResult, QueryHandle, QuerySource, RawConnection, ReplicationMode, Restriction, Row,
    RowShape, RowTransform, ScalarKind, Session, ShapeField, SoftDelete, SqlAliases, ToRow,
    ToValue, Value, Window, Work,
};

// The `values!` convenience macro lives in the core crate.
pub use daokit_core::values;

// Re-export the derive macros.
pub use daokit_macros::{Entity, Projection};

// Query-text helpers under a short module name.
pub use daokit_sql_builder as sql_builder;

pub use bind::bind_parameters;
pub use query::{build_query, build_sql_query, configure_projection};
pub use repository::{GenericRepository, LazyRef, DEFAULT_ALIAS};
