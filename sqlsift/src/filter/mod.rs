//! Filter trees.
//!
//! A [`Filter`] is the typed form of the JSON filter grammar. Trees come
//! either from untrusted JSON via [`parse_filter`] or from trusted code via
//! the helper constructors.
//!
//! ```
//! use sqlsift::filter::{self, Filter};
//! use sqlsift::CompareOp;
//!
//! let built = filter::and(vec![
//!     filter::field("firstName", filter::eq("ann")),
//!     filter::field("age", filter::compare(CompareOp::Gte, 18)),
//! ]);
//! let parsed = sqlsift::parse_filter(r#"{"firstName": "ann", "age": {"$gte": 18}}"#).unwrap();
//! assert_eq!(built, parsed);
//! ```

mod marker;
mod parse;

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::expr::CompareOp;

pub use marker::{merge_filters, require_scope, unwrap_filter};
pub use parse::{parse_filter, parse_filter_value, parse_filter_with_depth};

/// A scalar filter value before normalization.
///
/// The serialized form tags each value (`{"t": "int", "v": 3}`) so cursors
/// round-trip without losing the distinction between integers, floats and
/// datetimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum CompareValue {
    /// JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    String(String),
    /// Timestamp, from `{"$": "$date", "value": ..}`.
    Datetime(DateTime<Utc>),
    /// The compile time, from `{"$": "$now"}`.
    Now,
}

impl CompareValue {
    /// Returns `true` for [`CompareValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the value kind, used in type mismatch errors.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) | Self::Float(_) => "number",
            Self::String(_) => "string",
            Self::Datetime(_) | Self::Now => "datetime",
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Float(_) => 2,
            Self::String(_) => 3,
            Self::Datetime(_) | Self::Now => 4,
        }
    }

    /// Total order used by in-memory sort comparators. NULL is the smallest value.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Int(a), Self::Float(b)) => (*a as f64).total_cmp(b),
            #[allow(clippy::cast_precision_loss)]
            (Self::Float(a), Self::Int(b)) => a.total_cmp(&(*b as f64)),
            (Self::Float(a), Self::Float(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Datetime(a), Self::Datetime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<bool> for CompareValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for CompareValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for CompareValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for CompareValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for CompareValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for CompareValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for CompareValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Datetime(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for CompareValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// A node of a filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// All children match. Empty matches everything.
    And(Vec<Self>),
    /// At least one child matches. Empty matches nothing.
    Or(Vec<Self>),
    /// The child does not match.
    Not(Box<Self>),
    /// Descend into a field. `name` may be a dotted path.
    Field {
        /// Field name.
        name: String,
        /// Filter applied to the field.
        filter: Box<Self>,
    },
    /// Compare the selected column with a value.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Operand.
        value: CompareValue,
    },
    /// The selected column equals one of the values.
    In(Vec<CompareValue>),
    /// The selected text column contains the substring.
    Contains(String),
    /// A related row matching the filter exists.
    ElemMatch(Box<Self>),
    /// Placeholder in a template filter, see [`unwrap_filter`].
    Marker,
}

impl Filter {
    /// Returns `true` for a filter that matches everything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::And(children) if children.is_empty())
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

/// `$and` of `filters`.
#[must_use]
pub fn and(filters: Vec<Filter>) -> Filter {
    Filter::And(filters)
}

/// `$or` of `filters`.
#[must_use]
pub fn or(filters: Vec<Filter>) -> Filter {
    Filter::Or(filters)
}

/// `$not` of `filter`.
#[must_use]
pub fn not(filter: Filter) -> Filter {
    Filter::Not(Box::new(filter))
}

/// Apply `filter` to the field `name`.
pub fn field(name: impl Into<String>, filter: Filter) -> Filter {
    Filter::Field {
        name: name.into(),
        filter: Box::new(filter),
    }
}

/// `$eq` with `value`.
pub fn eq(value: impl Into<CompareValue>) -> Filter {
    compare(CompareOp::Eq, value)
}

/// Comparison with `value`.
pub fn compare(op: CompareOp, value: impl Into<CompareValue>) -> Filter {
    Filter::Compare {
        op,
        value: value.into(),
    }
}

/// `$in` with `values`.
#[must_use]
pub fn in_values(values: Vec<CompareValue>) -> Filter {
    Filter::In(values)
}

/// `$contains` with `needle`.
pub fn contains(needle: impl Into<String>) -> Filter {
    Filter::Contains(needle.into())
}

/// `$elemMatch` with `filter`.
#[must_use]
pub fn elem_match(filter: Filter) -> Filter {
    Filter::ElemMatch(Box::new(filter))
}
