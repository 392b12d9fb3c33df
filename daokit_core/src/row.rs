use crate::value::{FromValue, Value};
use crate::{OrmError, OrmResult};

/// Ordered column/value pairs: the generic row representation engines
/// return and mapping consumes.
///
/// Column order is the order columns were first set, which for engine
/// rows is the select-list order. Lookup is linear; rows are small.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    /// Sets a column, replacing any existing value under the same name.
    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|(name, _)| name == column)
    }

    /// The first column's value; count queries read their scalar here.
    pub fn first(&self) -> Option<&Value> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

/// Reads a required column, converting it into `T`.
pub fn row_field<T: FromValue>(row: &Row, column: &str) -> OrmResult<T> {
    match row.get(column) {
        Some(value) => T::from_value(value).map_err(OrmError::mapping),
        None => Err(OrmError::mapping_message(format!(
            "missing column `{column}` in row"
        ))),
    }
}

/// Reads an optional column: both a missing column and an explicit null
/// read as `None`.
pub fn row_field_opt<T: FromValue>(row: &Row, column: &str) -> OrmResult<Option<T>> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::from_value(value).map(Some).map_err(OrmError::mapping),
    }
}
