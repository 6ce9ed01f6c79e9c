use bson::Bson;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::errors::DbError;

/// `chrono` format of date strings; fixed width, so byte order equals calendar order.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATE_WIDTH: usize = 10;

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// A numeric scalar. Integers and floats compare numerically with each other.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// Adds two numbers; integer sums stay integers until they overflow.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn plus(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => {
                a.checked_add(b).map_or_else(|| Self::Float(a as f64 + b as f64), Self::Int)
            }
            (a, b) => Self::Float(a.as_f64() + b.as_f64()),
        }
    }

    fn is_nan(self) -> bool {
        matches!(self, Self::Float(f) if f.is_nan())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => {
            let frac = f - whole;
            if frac > 0.0 {
                Ordering::Less
            } else if frac < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        o => o,
    }
}

fn cmp_floats(a: f64, b: f64) -> Ordering {
    // NaN sorts above every number and equals itself; -0.0 equals 0.0.
    a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan()))
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => a.cmp(&b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(a, b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(b, a).reverse(),
            (Self::Float(a), Self::Float(b)) => cmp_floats(a, b),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl Hash for Number {
    #[allow(clippy::cast_possible_truncation)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal numbers must hash alike across Int and Float.
        match *self {
            Self::Int(i) => {
                0u8.hash(state);
                i.hash(state);
            }
            n if n.is_nan() => 2u8.hash(state),
            Self::Float(f) if f.fract() == 0.0 && (-TWO_POW_63..TWO_POW_63).contains(&f) => {
                0u8.hash(state);
                (f as i64).hash(state);
            }
            Self::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state);
            }
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Int(i) => serializer.serialize_i64(i),
            Self::Float(f) => serializer.serialize_f64(f),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Kind of a scalar; the declaration order is the cross-kind sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueKind {
    Number,
    String,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Number => "number",
            Self::String => "string",
            Self::Date => "date",
        })
    }
}

/// Closed scalar type held by document fields.
///
/// Ordering is total: values of different kinds order by [`ValueKind`], numbers
/// numerically, strings and dates lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(Number),
    String(String),
    Date(String),
}

/// Whether `s` is a valid fixed-width `YYYY-MM-DD` date.
#[must_use]
pub fn is_date_string(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == DATE_WIDTH
        && b[4] == b'-'
        && b[7] == b'-'
        && NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
        }
    }

    /// A date value; fails unless `s` is a fixed-width `YYYY-MM-DD` date.
    ///
    /// # Errors
    /// Returns `Validation` for anything that is not a calendar date in that format.
    pub fn date(s: impl Into<String>) -> Result<Self, DbError> {
        let s = s.into();
        if is_date_string(&s) {
            Ok(Self::Date(s))
        } else {
            Err(DbError::validation("date value", format!("{s:?} is not a YYYY-MM-DD date")))
        }
    }

    /// Classifies loosely typed text: date-formatted text becomes a date, anything else a string.
    #[must_use]
    pub fn infer(s: &str) -> Self {
        if is_date_string(s) { Self::Date(s.to_owned()) } else { Self::String(s.to_owned()) }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<Number> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text of a string or date value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Date(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Ordering between two values of the same kind; `None` across kinds.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        (self.kind() == other.kind()).then(|| self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) | Self::Date(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Number(Number::Int(i))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Number(Number::Int(i64::from(i)))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Number(Number::Float(f))
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Self::Number(n)
    }
}

/// Text converts through [`Value::infer`]; use `Value::String` for text that
/// must never compare as a date.
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::infer(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        if is_date_string(&s) { Self::Date(s) } else { Self::String(s) }
    }
}

impl TryFrom<&Bson> for Value {
    type Error = DbError;

    fn try_from(b: &Bson) -> Result<Self, Self::Error> {
        match b {
            Bson::Int32(i) => Ok(Self::from(*i)),
            Bson::Int64(i) => Ok(Self::from(*i)),
            Bson::Double(f) => Ok(Self::from(*f)),
            Bson::String(s) => Ok(Self::infer(s)),
            other => Err(DbError::validation(
                "literal",
                format!("unsupported value {other}; expected a string, number or date"),
            )),
        }
    }
}

impl From<&Value> for Bson {
    fn from(v: &Value) -> Self {
        match v {
            Value::Number(Number::Int(i)) => Self::Int64(*i),
            Value::Number(Number::Float(f)) => Self::Double(*f),
            Value::String(s) | Value::Date(s) => Self::String(s.clone()),
        }
    }
}
