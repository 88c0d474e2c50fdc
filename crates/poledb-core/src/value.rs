//! Column values and records
//!
//! `Value` is the tagged union the engine moves between callers and the
//! database. `Record` is one row, `Data` is an insert/update payload and a
//! `Filters` set narrows a select.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key value assigned by the database
pub type RowId = i64;

/// One row: column name to value
pub type Record = BTreeMap<String, Value>;

/// Column/value payload for insert and update
pub type Data = BTreeMap<String, Value>;

/// Exact-match filters, ANDed together
pub type Filters = BTreeMap<String, Value>;

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Parse a command-line literal
    ///
    /// `null`, `true` and `false` are keywords; anything that parses as an
    /// integer or a float becomes a number; everything else is text.
    pub fn parse_literal(raw: &str) -> Self {
        match raw {
            "null" => Value::Null,
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                if let Ok(i) = raw.parse::<i64>() {
                    Value::Int(i)
                } else if let Ok(f) = raw.parse::<f64>() {
                    if f.is_finite() {
                        Value::Float(f)
                    } else {
                        Value::Text(raw.to_string())
                    }
                } else {
                    Value::Text(raw.to_string())
                }
            }
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when matching this value in a search
    ///
    /// Null renders as the empty string so it never matches a non-empty key.
    pub fn search_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Text(s) => Cow::Borrowed(s),
            other => Cow::Owned(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // Keep a fractional digit so 1.0 does not print as 1
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Build a `Data`/`Filters`/`Record` map from column/value pairs
///
/// ```
/// use poledb_core::{data, Value};
///
/// let payload = data! { "pole_number" => "P1", "lat" => 1.0 };
/// assert_eq!(payload["lat"], Value::Float(1.0));
/// ```
#[macro_export]
macro_rules! data {
    () => { ::std::collections::BTreeMap::<String, $crate::Value>::new() };
    ($($col:expr => $val:expr),+ $(,)?) => {{
        let mut map = ::std::collections::BTreeMap::<String, $crate::Value>::new();
        $( map.insert(String::from($col), $crate::Value::from($val)); )+
        map
    }};
}
