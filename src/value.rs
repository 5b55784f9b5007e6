use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;

/// A row fetched from the relational layer, or an output object.
pub type Row = BTreeMap<String, Value>;

/// Dynamically typed value carried between the database, resolvers and output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL / absent.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 text.
    String(String),
    /// Ordered list (list-valued relations).
    List(Vec<Value>),
    /// Nested object (resolved child rows).
    Object(Row),
}

impl Value {
    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Borrows the text payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Object(_) => 5,
        }
    }

    /// Total order used by the post-fetch sort.
    ///
    /// Null is the smallest value. Values of different kinds compare by kind
    /// rank; ints and floats compare numerically.
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.sort_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(_), Value::Object(_)) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value as Sql;
        match value {
            Sql::Null => Value::Null,
            Sql::Integer(v) => Value::Int(v),
            Sql::Real(v) => Value::Float(v),
            Sql::Text(v) => Value::String(v),
            Sql::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str(other.kind()),
            },
        }
    }
}

/// Hashable key used to index buffered rows.
///
/// SQLite hands back integer identities as `Int`, and inline key lists carry
/// them as text. Text that parses as an integer is normalized to `Int` so both
/// sides meet in the same bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowKey {
    /// Integer key.
    Int(i64),
    /// Non-numeric text key.
    Text(String),
}

impl RowKey {
    /// Builds a key from a column value. Null and composite values are rejected.
    pub fn from_value(value: &Value) -> Result<Self, ResolverError> {
        match value {
            Value::Int(v) => Ok(RowKey::Int(*v)),
            Value::String(s) => Ok(RowKey::parse(s)),
            Value::Float(v) if v.fract() == 0.0 => Ok(RowKey::Int(*v as i64)),
            other => Err(ResolverError::MalformedKey {
                value: other.to_string(),
                reason: "key must be an integer or text",
            }),
        }
    }

    /// Builds a key from text, normalizing integers.
    pub fn parse(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(v) => RowKey::Int(v),
            Err(_) => RowKey::Text(text.trim().to_owned()),
        }
    }

    /// Converts back to a [`Value`] for binding.
    pub fn to_value(&self) -> Value {
        match self {
            RowKey::Int(v) => Value::Int(*v),
            RowKey::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(v) => write!(f, "{v}"),
            RowKey::Text(s) => f.write_str(s),
        }
    }
}
