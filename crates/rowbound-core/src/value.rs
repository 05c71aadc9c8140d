//! Scalar values exchanged with the storage engine.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A scalar (or set-column list) value as stored on an entity or bound to a
/// parameterized statement.
///
/// `Value` is deliberately small: the engine is metadata-driven, so richer
/// column types (timestamps, enums, sets, boolean flags) are expressed through
/// the column type string plus the conversion layer, not through extra
/// variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL. On a dirty entity field this means "clear this field".
    Null,
    /// A boolean flag (single-byte column on the storage side).
    Bool(bool),
    /// An integer column value.
    Int(i64),
    /// A floating-point column value.
    Float(f64),
    /// A text column value (also the raw form of timestamps and sets).
    Text(String),
    /// An ordered multi-value list (the domain form of a `set` column).
    List(Vec<String>),
}

impl Value {
    /// True for `Value::Null`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The numeric reading of this value, if it has one.
    ///
    /// Integers, floats, and numeric text all qualify; booleans, lists, and
    /// non-numeric text do not.
    #[must_use]
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// The integer reading of this value, if exact.
    #[must_use]
    pub fn integer(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Text(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    /// True if the value has a numeric reading.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.numeric().is_some()
    }

    /// Loose truthiness used when packing boolean-flag columns.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty() && s != "0",
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Borrow the text content, if this is a `Text` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Equivalence with numeric-string tolerance.
    ///
    /// Change tracking must not consider `5` and `"5"` different values: the
    /// storage engine returns numbers as it pleases, and a round-trip through
    /// it must not dirty untouched fields. Two values with numeric readings
    /// compare numerically; everything else compares structurally.
    #[must_use]
    pub fn equivalent(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.numeric(), other.numeric()) {
            return a == b;
        }
        self == other
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bit-level comparison keeps Eq/Hash consistent for floats.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Variant tag first so Int(0) and Bool(false) never collide.
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            Value::Int(i) => {
                2u8.hash(state);
                i.hash(state);
            }
            Value::Float(f) => {
                3u8.hash(state);
                f.to_bits().hash(state);
            }
            Value::Text(s) => {
                4u8.hash(state);
                s.hash(state);
            }
            Value::List(items) => {
                5u8.hash(state);
                items.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
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

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
