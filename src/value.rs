use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Serialize, Serializer};

use crate::data_type::DataType;

/// Decimal places used for every monetary figure a query reports.
pub const MONEY_SCALE: u32 = 2;

/// Represents a single data value stored in the dataset or produced by a query.
///
/// Besides the typed variants it carries two markers: [Value::Null], the absent
/// value (outer-join miss, window lookup past the partition edge, optional
/// field), and [Value::Undefined], the result of a division by zero.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// represents an empty or missing value.
    Null,
    /// The result of an arithmetic operation with no defined answer.
    Undefined,
    /// A 64-bit signed integer value.
    Int(i64),
    /// An exact decimal value.
    Decimal(Decimal),
    /// A UTF-8 string value, wrapped in an [Arc] for efficient,
    /// thread-safe sharing and cheap cloning.
    Text(Arc<str>),
    /// A boolean value.
    Bool(bool),
    /// A calendar date.
    Date(NaiveDate),
}

impl Value {
    /// Builds a [Value::Text] from anything string-like.
    pub fn text(s: impl AsRef<str>) -> Self {
        Self::Text(Arc::from(s.as_ref()))
    }

    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the value is [Value::Undefined].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Returns the inner integer value if this is a [Value::Int].
    /// Otherwise, returns `None`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a decimal if it is numeric.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Int(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Returns a reference to the inner string slice if this is a [Value::Text].
    /// Otherwise, returns `None`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner boolean value if this is a [Value::Bool].
    /// Otherwise, returns `None`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the logical [DataType] corresponding to this value.
    ///
    /// Returns `None` for [Value::Null] and [Value::Undefined]: markers are
    /// untyped until they are placed in a column. Booleans only exist in
    /// parameters and predicates, so they have no column type either.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null | Self::Undefined | Self::Bool(_) => None,
            Self::Int(_) => Some(DataType::Int),
            Self::Decimal(_) => Some(DataType::Decimal),
            Self::Text(_) => Some(DataType::Text),
            Self::Date(_) => Some(DataType::Date),
        }
    }

    /// SQL equality: markers never equal anything, numbers compare across
    /// `Int` and `Decimal`.
    ///
    /// Returns `None` when the values are not comparable.
    pub fn sql_eq(&self, other: &Self) -> Option<bool> {
        self.sql_cmp(other).map(|ord| ord == Ordering::Equal)
    }

    /// SQL comparison. Returns `None` if either side is a marker or the types
    /// cannot be compared.
    pub fn sql_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(l), Self::Int(r)) => Some(l.cmp(r)),
            (Self::Int(_) | Self::Decimal(_), Self::Int(_) | Self::Decimal(_)) => {
                Some(self.as_decimal()?.cmp(&other.as_decimal()?))
            }
            (Self::Text(l), Self::Text(r)) => Some(l.cmp(r)),
            (Self::Bool(l), Self::Bool(r)) => Some(l.cmp(r)),
            (Self::Date(l), Self::Date(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Total order used by sorting: `Null` first, then `Undefined`, then
    /// numbers, text, booleans and dates.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.sql_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Undefined => 1,
            Self::Int(_) | Self::Decimal(_) => 2,
            Self::Text(_) => 3,
            Self::Bool(_) => 4,
            Self::Date(_) => 5,
        }
    }

    /// Rounds numbers half away from zero to `scale` decimal places.
    /// Integers and markers pass through.
    pub fn round(&self, scale: u32) -> Option<Self> {
        match self {
            Self::Decimal(d) => Some(Self::Decimal(round_half_away(*d, scale))),
            Self::Int(_) | Self::Null | Self::Undefined => Some(self.clone()),
            _ => None,
        }
    }
}

/// Half-away-from-zero rounding, the rule for all monetary output.
pub fn round_half_away(d: Decimal, scale: u32) -> Decimal {
    d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Undefined => write!(f, "undefined"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

// Markers serialise as `null` and `"undefined"` so a JSON consumer can tell
// them apart. Decimals are written as strings ("370.00") to keep their exact
// scale; dates as `YYYY-MM-DD`.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Undefined => serializer.serialize_str("undefined"),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Decimal(d) => Serialize::serialize(d, serializer),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Date(d) => Serialize::serialize(d, serializer),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::text(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
