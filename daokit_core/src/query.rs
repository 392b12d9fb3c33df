use crate::value::Value;

/// Query language a piece of text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// Object-level query language over mapped entity and property names.
    Entity,
    /// Native SQL passed through to the storage engine.
    Native,
}

/// Where query text comes from. The tag makes the caller's intent
/// explicit: a name that does not resolve is an error, never silently
/// retried as ad-hoc text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuerySource<'a> {
    /// A query pre-registered with the engine, resolved by name.
    Named(&'a str),
    /// Ad-hoc query text compiled on the spot.
    Text(&'a str),
}

impl<'a> From<&'a str> for QuerySource<'a> {
    fn from(text: &'a str) -> Self {
        QuerySource::Text(text)
    }
}

/// Parameter values for one query invocation. Exactly one style applies
/// per call.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Binding {
    /// No parameters; binding is a no-op.
    #[default]
    None,
    /// Values for positional slots, or for named parameters under the
    /// ordering rules of [`NamedOrder`].
    Positional(Vec<Value>),
    /// Entries bound by parameter name. Unknown names are rejected by
    /// the engine, not dropped.
    Named(Vec<(String, Value)>),
}

impl Binding {
    pub fn positional(values: Vec<Value>) -> Self {
        Binding::Positional(values)
    }

    pub fn named(entries: Vec<(String, Value)>) -> Self {
        Binding::Named(entries)
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Binding::None => true,
            Binding::Positional(values) => values.is_empty(),
            Binding::Named(entries) => entries.is_empty(),
        }
    }
}

/// How positional values map onto a query's named parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamedOrder {
    /// Compatibility default: parameters are walked in declaration order
    /// while a cursor walks the values backwards from one below the
    /// declared count, so the first declared parameter receives
    /// `values[declared - 1]` and values past the declared count are
    /// never read.
    #[default]
    TailFirst,
    /// First declared parameter receives the first value.
    Declared,
}

/// Pagination window applied before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: usize,
    pub limit: usize,
}

impl Window {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn first_page(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    /// A zero limit contractually yields an empty result without a fetch.
    pub fn is_empty(&self) -> bool {
        self.limit == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Result ordering on a mapped property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub property: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            direction: Direction::Desc,
        }
    }
}

/// Property filter for criteria queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Restriction {
    Eq { property: String, value: Value },
    In { property: String, values: Vec<Value> },
}

impl Restriction {
    pub fn eq(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Restriction::Eq {
            property: property.into(),
            value: value.into(),
        }
    }

    pub fn in_list(property: impl Into<String>, values: Vec<Value>) -> Self {
        Restriction::In {
            property: property.into(),
            values,
        }
    }
}

/// Engine-side result transformers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTransform {
    /// Each distinct root entity appears once in the result.
    DistinctRootEntity,
    /// Rows come back as alias-keyed generic mappings.
    AliasEntityMap,
}

/// Entity registration for native queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqlAliases<'a> {
    /// No registration; rows are returned as generic mappings.
    #[default]
    None,
    /// Register the repository's own entity under its default alias.
    DefaultEntity,
    /// Register each alias against a mapped entity name. An empty map
    /// behaves like [`SqlAliases::DefaultEntity`].
    Map(&'a [(&'a str, &'a str)]),
}

/// Lock requested when refreshing an entity's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Upgrade,
    UpgradeNoWait,
}

/// How replicated state meets an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationMode {
    Ignore,
    Overwrite,
    Exception,
    LatestVersion,
}

/// Engine-resolved mapping facts for an entity. Authoritative over
/// anything declared on the Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMeta {
    pub entity_name: String,
    pub id_property: String,
}

impl EntityMeta {
    pub fn new(entity_name: impl Into<String>, id_property: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            id_property: id_property.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_source_from_str_is_adhoc_text() {
        let source: QuerySource = "from Member X".into();
        assert_eq!(source, QuerySource::Text("from Member X"));
    }

    #[test]
    fn binding_default_is_none_and_empty() {
        assert!(Binding::default().is_empty());
        assert!(Binding::positional(Vec::new()).is_empty());
        assert!(!Binding::positional(vec![Value::Int(1)]).is_empty());
    }

    #[test]
    fn named_order_defaults_to_tail_first() {
        assert_eq!(NamedOrder::default(), NamedOrder::TailFirst);
    }

    #[test]
    fn zero_limit_window_is_empty() {
        assert!(Window::new(10, 0).is_empty());
        assert!(!Window::first_page(1).is_empty());
    }

    #[test]
    fn order_constructors_carry_direction() {
        assert_eq!(Order::asc("name").direction, Direction::Asc);
        assert_eq!(Order::desc("name").direction, Direction::Desc);
    }

    #[test]
    fn sql_aliases_default_to_no_registration() {
        assert_eq!(SqlAliases::default(), SqlAliases::None);
    }
}
