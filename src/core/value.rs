// value model + per-kind emptiness
use std::fmt;

use chrono::{DateTime, Utc};

/// A tree-shaped value built from the closed set of kinds the flattener
/// understands. Everything is owned, so a `Value` can never be cyclic.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    /// Textual scalar, emitted verbatim (no escaping).
    Text(String),
    /// Time-instant. Structured internally but always an atomic leaf.
    Instant(DateTime<Utc>),
    /// Indirection: present/absent reference to another value.
    Optional(Option<Box<Value>>),
    /// Indexable ordered sequence.
    Seq(Vec<Value>),
    /// Named fields in declaration order. A `Vec`, not a map, so order
    /// survives construction.
    Record(Vec<(String, Value)>),
}

/// Kind tag for a `Value`. The lowercase name doubles as the output key for
/// a root-level leaf, which otherwise would have an empty path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Instant,
    Optional,
    Seq,
    Record,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::Text => "string",
            Kind::Instant => "time",
            Kind::Optional => "option",
            Kind::Seq => "seq",
            Kind::Record => "record",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Float(_) => Kind::Float,
            Value::Text(_) => Kind::Text,
            Value::Instant(_) => Kind::Instant,
            Value::Optional(_) => Kind::Optional,
            Value::Seq(_) => Kind::Seq,
            Value::Record(_) => Kind::Record,
        }
    }

    /// Per-kind emptiness table. Empty values are dropped from flattened
    /// output entirely (no key at all, never an empty-string entry).
    ///
    /// - absent optional: empty; a present optional is as empty as its contents
    /// - zero instant (the Unix epoch, `DateTime::<Utc>::default()`): empty
    /// - empty string: empty
    /// - empty sequence: empty
    /// - numbers and bools: never empty (`0` and `false` are meaningful)
    /// - records: never empty as such (a record with no fields just yields
    ///   no entries)
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Optional(None) => true,
            Value::Optional(Some(inner)) => inner.is_empty(),
            Value::Instant(t) => *t == DateTime::<Utc>::default(),
            Value::Text(s) => s.is_empty(),
            Value::Seq(items) => items.is_empty(),
            Value::Bool(_) | Value::Int(_) | Value::Uint(_) | Value::Float(_) => false,
            Value::Record(_) => false,
        }
    }

    /// Record from `(name, value)` pairs, keeping the given order.
    pub fn record<K, V, I>(fields: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn seq<V, I>(items: I) -> Value
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Value::Seq(items.into_iter().map(Into::into).collect())
    }

    /// Present indirection.
    pub fn some(value: impl Into<Value>) -> Value {
        Value::Optional(Some(Box::new(value.into())))
    }

    /// Absent indirection.
    pub const fn none() -> Value {
        Value::Optional(None)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value {
                Value::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! from_uint {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Value {
                Value::Uint(u64::from(v))
            }
        })*
    };
}

from_int!(i8, i16, i32, i64);
from_uint!(u8, u16, u32, u64);

impl From<isize> for Value {
    fn from(v: isize) -> Value {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Value {
        Value::Uint(v as u64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Value {
        Value::Instant(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        Value::Optional(v.map(|inner| Box::new(inner.into())))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Value {
        Value::Seq(v.into_iter().map(Into::into).collect())
    }
}
