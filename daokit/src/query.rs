//! Query construction: source resolution, binding, native alias
//! registration and projection configuration.

use daokit_core::{
    Binding, Dialect, NamedOrder, OrmError, OrmResult, QueryHandle, QuerySource, RowShape,
    Session, SqlAliases,
};

use crate::bind::bind_parameters;

fn resolve_text<S: Session>(
    session: &S,
    dialect: Dialect,
    source: QuerySource<'_>,
) -> OrmResult<String> {
    match source {
        QuerySource::Named(name) => {
            if name.trim().is_empty() {
                return Err(OrmError::EmptyQuery);
            }
            session.named_query(name, dialect).ok_or_else(|| {
                OrmError::storage_message(format!("no query registered under name `{name}`"))
            })
        }
        QuerySource::Text(text) => {
            if text.trim().is_empty() {
                return Err(OrmError::EmptyQuery);
            }
            Ok(text.to_string())
        }
    }
}

/// Compiles a query in the given dialect and applies the binding.
///
/// Blank text or a blank name fails with [`OrmError::EmptyQuery`] before
/// the engine is touched; a name with no registration is an error, never
/// retried as ad-hoc text. The returned handle is ready for windowing,
/// configuration and execution.
pub async fn build_query<S: Session>(
    session: &S,
    dialect: Dialect,
    source: QuerySource<'_>,
    binding: &Binding,
    order: NamedOrder,
) -> OrmResult<S::Handle> {
    let text = resolve_text(session, dialect, source)?;
    let mut handle = session.query(dialect, &text).await?;
    bind_parameters(&mut handle, binding, order)?;
    Ok(handle)
}

/// Native-dialect variant of [`build_query`] with entity registration.
///
/// `aliases` follows the three-state rule: a map registers each alias,
/// an explicit-but-empty map (or [`SqlAliases::DefaultEntity`]) registers
/// the repository's own entity, and [`SqlAliases::None`] registers
/// nothing so rows come back as generic mappings.
pub async fn build_sql_query<S: Session>(
    session: &S,
    source: QuerySource<'_>,
    aliases: SqlAliases<'_>,
    default_entity: &str,
    binding: &Binding,
    order: NamedOrder,
) -> OrmResult<S::Handle> {
    let text = resolve_text(session, Dialect::Native, source)?;
    let mut handle = session.query(Dialect::Native, &text).await?;
    match aliases {
        SqlAliases::None => {}
        SqlAliases::DefaultEntity | SqlAliases::Map(&[]) => {
            handle.add_entity(default_entity, default_entity);
        }
        SqlAliases::Map(map) => {
            for (alias, entity) in map {
                handle.add_entity(alias, entity);
            }
        }
    }
    bind_parameters(&mut handle, binding, order)?;
    Ok(handle)
}

/// Registers every projected column of `P` as a typed scalar on the
/// handle. Call paths without a shape simply never call this; absence of
/// a shape means no registration at all.
pub fn configure_projection<P: RowShape, H: QueryHandle>(handle: &mut H) {
    for field in P::fields() {
        handle.add_scalar(field.name, field.kind);
    }
}
