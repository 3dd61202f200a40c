//! Parse the JSON filter grammar into [`Filter`] trees.
//!
//! # Supported Syntax
//!
//! | Syntax | Example | Meaning |
//! |--------|---------|---------|
//! | Implicit `$eq` | `{"name": "Ann"}` | name equals `ann` (case-insensitive) |
//! | Explicit operator | `{"age": {"$gte": 18}}` | `age >= 18` |
//! | Sibling keys | `{"a": 1, "b": 2}` | `a = 1 AND b = 2` |
//! | `$and` / `$or` | `{"$or": [{..}, {..}]}` | composite |
//! | `$not` | `{"$not": {..}}` | negation |
//! | `$in` | `{"status": {"$in": ["a", "b"]}}` | membership |
//! | `$contains` | `{"name": {"$contains": "an"}}` | substring |
//! | `$elemMatch` | `{"groups": {"$elemMatch": {..}}}` | related row exists |
//! | Dot syntax | `{"settings.dog.name": "rex"}` | nested field |
//! | Magic values | `{"$": "$now"}`, `{"$": "$date", "value": 0}` | timestamps |

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

use super::{CompareValue, Filter};
use crate::config::CompilerConfig;
use crate::error::{FieldPath, FilterError, FilterErrorKind};
use crate::expr::CompareOp;

/// Parse a filter from JSON text with the default depth limit.
///
/// # Example
///
/// ```
/// use sqlsift::parse_filter;
///
/// let filter = parse_filter(r#"{
///     "status": {"$in": ["active", "pending"]},
///     "$or": [{"age": {"$lt": 18}}, {"age": null}]
/// }"#).unwrap();
///
/// assert!(parse_filter(r#"{"age": {"$between": [1, 2]}}"#).is_err());
/// ```
pub fn parse_filter(json: &str) -> Result<Filter, FilterError> {
    let value: JsonValue = serde_json::from_str(json)
        .map_err(|e| FilterError::at_root(FilterErrorKind::InvalidJson(e.to_string())))?;
    parse_filter_value(&value)
}

/// Parse an already decoded JSON value with the default depth limit.
pub fn parse_filter_value(value: &JsonValue) -> Result<Filter, FilterError> {
    parse_filter_with_depth(value, CompilerConfig::default().max_depth)
}

/// Parse an already decoded JSON value, rejecting nesting beyond `max_depth`.
pub fn parse_filter_with_depth(value: &JsonValue, max_depth: usize) -> Result<Filter, FilterError> {
    Parser { max_depth }.node(value, &FieldPath::root(), 1)
}

struct Parser {
    max_depth: usize,
}

impl Parser {
    fn node(&self, value: &JsonValue, path: &FieldPath, depth: usize) -> Result<Filter, FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::new(
                FilterErrorKind::TooDeep {
                    max: self.max_depth,
                },
                path.clone(),
            ));
        }
        match value {
            JsonValue::Object(map) if !is_magic(map) => self.object(map, path, depth),
            JsonValue::Array(items) => Ok(Filter::And(
                items
                    .iter()
                    .map(|item| self.node(item, path, depth + 1))
                    .collect::<Result<_, _>>()?,
            )),
            scalar => Ok(Filter::Compare {
                op: CompareOp::Eq,
                value: scalar_value(scalar, "$eq", path)?,
            }),
        }
    }

    fn object(
        &self,
        map: &Map<String, JsonValue>,
        path: &FieldPath,
        depth: usize,
    ) -> Result<Filter, FilterError> {
        let mut items = Vec::with_capacity(map.len());
        for (key, value) in map {
            items.push(self.entry(key, value, path, depth)?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Filter::And(items)
        })
    }

    fn entry(
        &self,
        key: &str,
        value: &JsonValue,
        path: &FieldPath,
        depth: usize,
    ) -> Result<Filter, FilterError> {
        let shape = |expected: &'static str| {
            FilterError::new(
                FilterErrorKind::InvalidShape {
                    operator: key.to_string(),
                    expected,
                },
                path.clone(),
            )
        };

        if !key.starts_with('$') {
            let child = path.child(key);
            return Ok(Filter::Field {
                name: key.to_string(),
                filter: Box::new(self.node(value, &child, depth + 1)?),
            });
        }

        if let Some(op) = CompareOp::from_operator(key) {
            return Ok(Filter::Compare {
                op,
                value: scalar_value(value, key, path)?,
            });
        }

        match key {
            "$and" | "$or" => {
                let children = match value {
                    JsonValue::Array(items) => items
                        .iter()
                        .map(|item| self.node(item, path, depth + 1))
                        .collect::<Result<Vec<_>, _>>()?,
                    JsonValue::Object(_) => vec![self.node(value, path, depth + 1)?],
                    _ => return Err(shape("a list of filters")),
                };
                Ok(if key == "$and" {
                    Filter::And(children)
                } else {
                    Filter::Or(children)
                })
            },
            "$not" => Ok(Filter::Not(Box::new(self.node(value, path, depth + 1)?))),
            "$in" => match value {
                JsonValue::Array(items) => Ok(Filter::In(
                    items
                        .iter()
                        .map(|item| scalar_value(item, key, path))
                        .collect::<Result<_, _>>()?,
                )),
                _ => Err(shape("an array of values")),
            },
            "$contains" => match value {
                JsonValue::String(s) => Ok(Filter::Contains(s.clone())),
                _ => Err(shape("a string")),
            },
            "$elemMatch" => match value {
                JsonValue::Object(_) | JsonValue::Array(_) => Ok(Filter::ElemMatch(Box::new(
                    self.node(value, path, depth + 1)?,
                ))),
                _ => Err(shape("a filter object")),
            },
            _ => Err(FilterError::new(
                FilterErrorKind::UnknownOperator(key.to_string()),
                path.clone(),
            )),
        }
    }
}

fn is_magic(map: &Map<String, JsonValue>) -> bool {
    map.contains_key("$")
}

/// Parse an operand: a JSON scalar or a magic value object.
fn scalar_value(value: &JsonValue, operator: &str, path: &FieldPath) -> Result<CompareValue, FilterError> {
    let err = |kind| FilterError::new(kind, path.clone());
    match value {
        JsonValue::Null => Ok(CompareValue::Null),
        JsonValue::Bool(b) => Ok(CompareValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(CompareValue::Int(i))
            } else if n.is_u64() {
                Err(err(FilterErrorKind::InvalidShape {
                    operator: operator.to_string(),
                    expected: "an integer within the signed 64-bit range",
                }))
            } else {
                n.as_f64().map(CompareValue::Float).ok_or_else(|| {
                    err(FilterErrorKind::InvalidShape {
                        operator: operator.to_string(),
                        expected: "a finite number",
                    })
                })
            }
        },
        JsonValue::String(s) => Ok(CompareValue::String(s.clone())),
        JsonValue::Object(map) if is_magic(map) => magic_value(map).map_err(err),
        _ => Err(err(FilterErrorKind::InvalidShape {
            operator: operator.to_string(),
            expected: "a scalar value",
        })),
    }
}

fn magic_value(map: &Map<String, JsonValue>) -> Result<CompareValue, FilterErrorKind> {
    let tag = map.get("$").and_then(JsonValue::as_str).unwrap_or_default();
    match tag {
        "$now" => Ok(CompareValue::Now),
        "$date" => {
            let invalid = || FilterErrorKind::InvalidShape {
                operator: "$date".to_string(),
                expected: "a millisecond timestamp or an RFC 3339 string",
            };
            let date = match map.get("value") {
                Some(JsonValue::Number(n)) => n
                    .as_i64()
                    .and_then(DateTime::<Utc>::from_timestamp_millis)
                    .ok_or_else(invalid)?,
                Some(JsonValue::String(s)) => DateTime::parse_from_rfc3339(s)
                    .map_err(|_| invalid())?
                    .with_timezone(&Utc),
                _ => return Err(invalid()),
            };
            Ok(CompareValue::Datetime(date))
        },
        other => Err(FilterErrorKind::UnsupportedMagicValue(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{and, compare, contains, elem_match, eq, field, in_values, not, or};
    use serde_json::json;

    #[test]
    fn test_implicit_eq() {
        let filter = parse_filter(r#"{"name": "Ann"}"#).unwrap();
        assert_eq!(filter, field("name", eq("Ann")));
    }

    #[test]
    fn test_sibling_keys_form_and_in_order() {
        let filter = parse_filter(r#"{"b": 1, "a": {"$gt": 2}}"#).unwrap();
        assert_eq!(
            filter,
            and(vec![
                field("b", eq(1)),
                field("a", compare(CompareOp::Gt, 2)),
            ])
        );
    }

    #[test]
    fn test_composites() {
        let filter = parse_filter(r#"{"$or": [{"a": 1}, {"$not": {"b": 2}}]}"#).unwrap();
        assert_eq!(
            filter,
            or(vec![field("a", eq(1)), not(field("b", eq(2)))])
        );

        let filter = parse_filter(r#"{"$and": {"a": 1}}"#).unwrap();
        assert_eq!(filter, and(vec![field("a", eq(1))]));
    }

    #[test]
    fn test_empty_object_matches_everything() {
        assert_eq!(parse_filter("{}").unwrap(), Filter::And(vec![]));
    }

    #[test]
    fn test_field_level_array_is_and() {
        let filter = parse_filter(r#"{"age": [{"$gt": 1}, {"$lt": 5}]}"#).unwrap();
        assert_eq!(
            filter,
            field(
                "age",
                and(vec![compare(CompareOp::Gt, 1), compare(CompareOp::Lt, 5)])
            )
        );
    }

    #[test]
    fn test_leaf_operators() {
        let filter = parse_filter(
            r#"{"s": {"$in": [null, "a"]}, "n": {"$contains": "x"}, "g": {"$elemMatch": {"id": 1}}}"#,
        )
        .unwrap();
        assert_eq!(
            filter,
            and(vec![
                field("s", in_values(vec![CompareValue::Null, "a".into()])),
                field("n", contains("x")),
                field("g", elem_match(field("id", eq(1)))),
            ])
        );
    }

    #[test]
    fn test_dotted_names_are_kept_whole() {
        let filter = parse_filter(r#"{"settings.dog.name": "rex"}"#).unwrap();
        assert_eq!(filter, field("settings.dog.name", eq("rex")));
    }

    #[test]
    fn test_magic_values() {
        let filter = parse_filter_value(&json!({"at": {"$lt": {"$": "$now"}}})).unwrap();
        assert_eq!(filter, field("at", compare(CompareOp::Lt, CompareValue::Now)));

        let filter = parse_filter_value(&json!({"at": {"$": "$date", "value": 0}})).unwrap();
        assert_eq!(
            filter,
            field("at", eq(DateTime::<Utc>::UNIX_EPOCH))
        );

        let filter =
            parse_filter_value(&json!({"at": {"$": "$date", "value": "1970-01-01T00:00:00Z"}}))
                .unwrap();
        assert_eq!(
            filter,
            field("at", eq(DateTime::<Utc>::UNIX_EPOCH))
        );
    }

    #[test]
    fn test_float_values() {
        let filter = parse_filter(r#"{"n": 1.5}"#).unwrap();
        assert_eq!(filter, field("n", eq(1.5)));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ERROR CASES
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_unknown_operator_reports_path() {
        let err = parse_filter(r#"{"dog": {"name": {"$regex": "x"}}}"#).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::UnknownOperator("$regex".into()));
        assert_eq!(err.path.to_string(), "dog.name");
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_filter("{not json").unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidJson(_)));
        assert_eq!(err.code(), "invalid_filter");
    }

    #[test]
    fn test_invalid_shapes() {
        let err = parse_filter(r#"{"a": {"$in": "x"}}"#).unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidShape { .. }));

        let err = parse_filter(r#"{"a": {"$contains": 3}}"#).unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidShape { .. }));

        let err = parse_filter(r#"{"a": {"$eq": [1]}}"#).unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidShape { .. }));

        let err = parse_filter(r#"{"$or": 1}"#).unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidShape { .. }));
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = parse_filter(r#"{"id": 9223372036854775808}"#).unwrap_err();
        assert_eq!(
            err.kind,
            FilterErrorKind::InvalidShape {
                operator: "$eq".into(),
                expected: "an integer within the signed 64-bit range",
            }
        );
        assert_eq!(err.path.to_string(), "id");

        let err = parse_filter(r#"{"id": {"$in": [1, 18446744073709551615]}}"#).unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::InvalidShape { .. }));

        let filter = parse_filter(r#"{"id": 9223372036854775807}"#).unwrap();
        assert_eq!(filter, field("id", eq(i64::MAX)));
    }

    #[test]
    fn test_unsupported_magic_value() {
        let err = parse_filter(r#"{"a": {"$": "$tomorrow"}}"#).unwrap_err();
        assert_eq!(
            err.kind,
            FilterErrorKind::UnsupportedMagicValue("$tomorrow".into())
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!(1);
        for _ in 0..40 {
            value = json!({ "a": value });
        }
        let err = parse_filter_value(&value).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::TooDeep { max: 32 });
        assert!(parse_filter_with_depth(&value, 64).is_ok());
    }
}
