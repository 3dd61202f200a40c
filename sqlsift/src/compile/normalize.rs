//! Value normalization by semantic type.

use chrono::{DateTime, Utc};

use super::SemanticType;
use crate::error::FilterErrorKind;
use crate::expr::Value;
use crate::filter::CompareValue;

/// Convert a filter value into the parameter compared against a column of type `ty`.
///
/// No coercion happens across kinds: a string compared with a number column
/// is rejected rather than guessed.
pub(crate) fn normalize(
    value: &CompareValue,
    ty: SemanticType,
    now: DateTime<Utc>,
) -> Result<Value, FilterErrorKind> {
    use SemanticType as T;

    match (value, ty) {
        (CompareValue::Null, _) => Ok(Value::Null),
        (CompareValue::Now, T::Datetime) => Ok(Value::Datetime(now)),
        (CompareValue::Datetime(d), T::Datetime) => Ok(Value::Datetime(*d)),
        (CompareValue::String(s), T::String | T::JSONString | T::JSONArray) => {
            Ok(Value::String(s.to_lowercase()))
        },
        (CompareValue::Bool(b), T::Boolean | T::Number) => Ok(Value::Int(i64::from(*b))),
        (CompareValue::Bool(b), T::JSONArray) => Ok(Value::Bool(*b)),
        (CompareValue::Int(n), T::Number | T::JSONArray) => Ok(Value::Int(*n)),
        (CompareValue::Int(n @ (0 | 1)), T::Boolean) => Ok(Value::Int(*n)),
        (CompareValue::Float(f), T::Number | T::JSONArray) => Ok(Value::Float(*f)),
        _ => Err(FilterErrorKind::TypeMismatch {
            value: value.kind_name(),
            column: ty,
        }),
    }
}
