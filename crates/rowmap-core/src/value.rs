//! The `Value` type: scalars crossing the storage boundary.
//!
//! Bind parameters, result-set cells, entity snapshots and primary keys are
//! all `Value`s. The enum carries two representations of temporal data: the
//! raw driver forms (`Timestamp` as epoch milliseconds, `Date` as epoch days)
//! that result sets produce, and the domain forms (`DateTime`, `LocalDate`)
//! that entity fields hold. [`Value::from_sql`] coerces driver forms into
//! domain forms when rows are materialized; [`Value::to_sql`] is the inverse,
//! applied by drivers when binding.

use std::hash::{Hash, Hasher};

use chrono::{DateTime as ChronoDateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Days between 0001-01-01 (day 1 of the common era) and 1970-01-01.
const UNIX_EPOCH_CE_DAYS: i32 = 719_162;

/// A database value.
#[derive(Debug, Clone, Serialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Driver-level timestamp: milliseconds since the Unix epoch, UTC.
    Timestamp(i64),
    /// Driver-level date: days since the Unix epoch.
    Date(i32),
    /// Domain-level timestamp without time zone.
    DateTime(NaiveDateTime),
    /// Domain-level calendar date.
    LocalDate(NaiveDate),
}

impl Value {
    /// Whether this value is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The variant name, for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::LocalDate(_) => "localdate",
        }
    }

    /// Extract an integer, if this value holds one.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a float, if this value holds one.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a bool, if this value holds one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a string slice, if this value holds text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Consume the value into a `String`, defaulting to empty for non-text.
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Value::Text(s) => s,
            _ => String::new(),
        }
    }

    /// Extract a domain timestamp, if this value holds one.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Extract a domain date, if this value holds one.
    #[must_use]
    pub const fn as_local_date(&self) -> Option<NaiveDate> {
        match self {
            Value::LocalDate(d) => Some(*d),
            _ => None,
        }
    }

    /// Coerce a driver-level value into its domain form.
    ///
    /// SQL timestamps become local datetimes and SQL dates become local
    /// dates; everything else passes through unchanged. Out-of-range raw
    /// values are left in driver form rather than dropped.
    #[must_use]
    pub fn from_sql(self) -> Self {
        match self {
            Value::Timestamp(millis) => ChronoDateTime::from_timestamp_millis(millis)
                .map_or(Value::Timestamp(millis), |dt| Value::DateTime(dt.naive_utc())),
            Value::Date(days) => NaiveDate::from_num_days_from_ce_opt(UNIX_EPOCH_CE_DAYS + 1 + days)
                .map_or(Value::Date(days), Value::LocalDate),
            other => other,
        }
    }

    /// Coerce a domain-level value into the raw driver form.
    #[must_use]
    pub fn to_sql(self) -> Self {
        match self {
            Value::DateTime(dt) => Value::Timestamp(dt.and_utc().timestamp_millis()),
            Value::LocalDate(d) => Value::Date(d.num_days_from_ce() - UNIX_EPOCH_CE_DAYS - 1),
            other => other,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Timestamp(ms) => write!(f, "timestamp({ms})"),
            Value::Date(days) => write!(f, "date({days})"),
            Value::DateTime(dt) => write!(f, "{dt}"),
            Value::LocalDate(d) => write!(f, "{d}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // Bit-pattern comparison keeps `Eq` lawful for floats.
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::LocalDate(a), Value::LocalDate(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
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
            Value::Bytes(b) => {
                5u8.hash(state);
                b.hash(state);
            }
            Value::Timestamp(ts) => {
                6u8.hash(state);
                ts.hash(state);
            }
            Value::Date(d) => {
                7u8.hash(state);
                d.hash(state);
            }
            Value::DateTime(dt) => {
                8u8.hash(state);
                dt.hash(state);
            }
            Value::LocalDate(d) => {
                9u8.hash(state);
                d.hash(state);
            }
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

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::LocalDate(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
