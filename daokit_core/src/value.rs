use chrono::NaiveDateTime;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Engine-neutral scalar value carried across the storage boundary.
///
/// Everything the repository binds into a query or reads out of a row is
/// one of these variants; concrete engines translate them to their own
/// wire types.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Bool(bool),
    Decimal(Decimal),
    Timestamp(NaiveDateTime),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable form, also used by the default-to-text coercion.
    pub fn display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            Value::Double(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Timestamp(t) => t.format(TIMESTAMP_FORMAT).to_string(),
            Value::Null => String::new(),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Decimal(_) => "decimal",
            Value::Timestamp(_) => "timestamp",
            Value::Null => "null",
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

/// Builds a `Vec<Value>` from a list of expressions convertible into
/// [`Value`].
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($v)),+]
    };
}

/// Raised when a value cannot be converted into the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot coerce {found} into {wanted}")]
pub struct CoerceError {
    wanted: &'static str,
    found: String,
}

impl CoerceError {
    pub fn new(wanted: &'static str, found: impl Into<String>) -> Self {
        Self {
            wanted,
            found: found.into(),
        }
    }

    fn from_value(wanted: &'static str, found: &Value) -> Self {
        Self::new(wanted, format!("{} `{}`", found.kind_name(), found.display()))
    }
}

/// The closed set of semantic column kinds projection and soft-delete
/// coercion dispatch over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    BigInt,
    Int,
    Double,
    Decimal,
    Bool,
    Timestamp,
    Text,
}

impl ScalarKind {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::BigInt => "bigint",
            ScalarKind::Int => "int",
            ScalarKind::Double => "double",
            ScalarKind::Decimal => "decimal",
            ScalarKind::Bool => "bool",
            ScalarKind::Timestamp => "timestamp",
            ScalarKind::Text => "text",
        }
    }

    /// Normalizes an engine value into this kind's canonical variant.
    /// `Null` passes through untouched so nullable columns survive.
    pub fn coerce(&self, value: &Value) -> Result<Value, CoerceError> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        Ok(match self {
            ScalarKind::BigInt => Value::BigInt(i64::from_value(value)?),
            ScalarKind::Int => Value::Int(i32::from_value(value)?),
            ScalarKind::Double => Value::Double(f64::from_value(value)?),
            ScalarKind::Decimal => Value::Decimal(Decimal::from_value(value)?),
            ScalarKind::Bool => Value::Bool(bool::from_value(value)?),
            ScalarKind::Timestamp => Value::Timestamp(NaiveDateTime::from_value(value)?),
            ScalarKind::Text => Value::Text(String::from_value(value)?),
        })
    }

    /// Converts a literal string into this kind. Soft-delete markers are
    /// resolved through this.
    pub fn parse_literal(&self, literal: &str) -> Result<Value, CoerceError> {
        self.coerce(&Value::Text(literal.to_string()))
    }
}

/// Conversion into the engine-neutral scalar.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion out of the engine-neutral scalar, with the lenient numeric
/// and text coercions the legacy count and mapping paths rely on.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CoerceError>;
}

/// Identifier types: convertible both ways, comparable, sendable.
pub trait KeyValue: ToValue + FromValue + Clone + PartialEq + Send + Sync + 'static {}

impl<T> KeyValue for T where T: ToValue + FromValue + Clone + PartialEq + Send + Sync + 'static {}

impl ToValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl ToValue for i64 {
    fn to_value(&self) -> Value {
        Value::BigInt(*self)
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for &str {
    fn to_value(&self) -> Value {
        Value::Text((*self).to_string())
    }
}

impl ToValue for Decimal {
    fn to_value(&self) -> Value {
        Value::Decimal(*self)
    }
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::BigInt(i) => Ok(*i),
            Value::Int(i) => Ok(i64::from(*i)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CoerceError::from_value("bigint", value)),
            Value::Decimal(d) if d.fract().is_zero() => d
                .to_i64()
                .ok_or_else(|| CoerceError::from_value("bigint", value)),
            _ => Err(CoerceError::from_value("bigint", value)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Int(i) => Ok(*i),
            Value::BigInt(i) => {
                i32::try_from(*i).map_err(|_| CoerceError::from_value("int", value))
            }
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CoerceError::from_value("int", value)),
            _ => Err(CoerceError::from_value("int", value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Double(f) => Ok(*f),
            Value::Int(i) => Ok(f64::from(*i)),
            Value::BigInt(i) => Ok(*i as f64),
            Value::Decimal(d) => d
                .to_f64()
                .ok_or_else(|| CoerceError::from_value("double", value)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CoerceError::from_value("double", value)),
            _ => Err(CoerceError::from_value("double", value)),
        }
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(0) | Value::BigInt(0) => Ok(false),
            Value::Int(1) | Value::BigInt(1) => Ok(true),
            Value::Text(s) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") || t == "1" => Ok(true),
                t if t.eq_ignore_ascii_case("false") || t == "0" => Ok(false),
                _ => Err(CoerceError::from_value("bool", value)),
            },
            _ => Err(CoerceError::from_value("bool", value)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Err(CoerceError::from_value("text", value)),
            other => Ok(other.display()),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Decimal(d) => Ok(*d),
            Value::Int(i) => Ok(Decimal::from(*i)),
            Value::BigInt(i) => Ok(Decimal::from(*i)),
            Value::Double(f) => {
                Decimal::from_f64(*f).ok_or_else(|| CoerceError::from_value("decimal", value))
            }
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| CoerceError::from_value("decimal", value)),
            _ => Err(CoerceError::from_value("decimal", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Timestamp(t) => Ok(*t),
            Value::Text(s) => {
                let trimmed = s.trim();
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map_err(|_| CoerceError::from_value("timestamp", value))
            }
            _ => Err(CoerceError::from_value("timestamp", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, CoerceError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_normalizes_numeric_forms_to_bigint() {
        for value in [
            Value::BigInt(42),
            Value::Int(42),
            Value::Text("42".into()),
            Value::Decimal(Decimal::from(42)),
        ] {
            assert_eq!(ScalarKind::BigInt.coerce(&value).unwrap(), Value::BigInt(42));
        }
    }

    #[test]
    fn coerce_rejects_fractional_decimal_as_bigint() {
        let value = Value::Decimal(Decimal::new(425, 1));
        assert!(ScalarKind::BigInt.coerce(&value).is_err());
    }

    #[test]
    fn null_passes_through_every_kind() {
        for kind in [
            ScalarKind::BigInt,
            ScalarKind::Int,
            ScalarKind::Double,
            ScalarKind::Decimal,
            ScalarKind::Bool,
            ScalarKind::Timestamp,
            ScalarKind::Text,
        ] {
            assert_eq!(kind.coerce(&Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn text_kind_accepts_anything() {
        assert_eq!(
            ScalarKind::Text.coerce(&Value::Bool(true)).unwrap(),
            Value::Text("true".into())
        );
        assert_eq!(
            ScalarKind::Text.coerce(&Value::BigInt(7)).unwrap(),
            Value::Text("7".into())
        );
    }

    #[test]
    fn timestamp_parses_common_text_forms() {
        let expected = NaiveDateTime::parse_from_str("2024-05-01 10:30:00", TIMESTAMP_FORMAT)
            .expect("fixture timestamp");
        for text in ["2024-05-01 10:30:00", "2024-05-01T10:30:00"] {
            assert_eq!(
                ScalarKind::Timestamp
                    .coerce(&Value::Text(text.into()))
                    .unwrap(),
                Value::Timestamp(expected)
            );
        }
    }

    #[test]
    fn parse_literal_resolves_soft_delete_markers() {
        assert_eq!(
            ScalarKind::Int.parse_literal("-1").unwrap(),
            Value::Int(-1)
        );
        assert_eq!(
            ScalarKind::Bool.parse_literal("true").unwrap(),
            Value::Bool(true)
        );
        assert!(ScalarKind::Int.parse_literal("soon").is_err());
    }

    #[test]
    fn option_round_trips_through_value() {
        let some: Option<i64> = Some(5);
        let none: Option<i64> = None;
        assert_eq!(some.to_value(), Value::BigInt(5));
        assert_eq!(none.to_value(), Value::Null);
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert_eq!(
            Option::<i64>::from_value(&Value::BigInt(5)).unwrap(),
            Some(5)
        );
    }

    #[test]
    fn values_macro_converts_each_argument() {
        let vs = values![1i64, "a", true];
        assert_eq!(
            vs,
            vec![
                Value::BigInt(1),
                Value::Text("a".into()),
                Value::Bool(true)
            ]
        );
        assert!(values![].is_empty());
    }

    #[test]
    fn coerce_error_names_both_sides() {
        let err = ScalarKind::Int
            .coerce(&Value::Bool(true))
            .expect_err("bool into int");
        assert_eq!(err.to_string(), "cannot coerce bool `true` into int");
    }
}
