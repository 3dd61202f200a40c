//! Leaf operators: comparisons, `$in` and `$contains` against one column.
//!
//! NULL is treated as the smallest value of every column, so that filters
//! agree with keyset pagination and `ORDER BY`.

use chrono::{DateTime, Utc};

use super::normalize::normalize;
use super::{ColumnDescriptor, Compiled, SemanticType};
use crate::error::FilterErrorKind;
use crate::expr::{CompareOp, Condition, Expr, Value};
use crate::filter::CompareValue;

/// Compile `column op value`.
pub(crate) fn compare(
    column: &ColumnDescriptor,
    op: CompareOp,
    value: &CompareValue,
    now: DateTime<Utc>,
) -> Result<Compiled, FilterErrorKind> {
    let value = normalize(value, column.semantic_type, now)?;
    Ok(match op {
        CompareOp::Eq => eq(column, value),
        CompareOp::Neq => eq(column, value).negate(),
        CompareOp::Gt => gt(column, value),
        CompareOp::Lte => gt(column, value).negate(),
        CompareOp::Lt => lt(column, value),
        CompareOp::Gte => lt(column, value).negate(),
    })
}

/// Compile `column IN values`.
pub(crate) fn in_values(
    column: &ColumnDescriptor,
    values: &[CompareValue],
    max_values: usize,
    now: DateTime<Utc>,
) -> Result<Compiled, FilterErrorKind> {
    if values.len() > max_values {
        return Err(FilterErrorKind::TooManyValues {
            max: max_values,
            actual: values.len(),
        });
    }
    if values.is_empty() {
        return Ok(Compiled::AlwaysFalse);
    }

    let has_null = values.iter().any(CompareValue::is_null);
    let non_null = values
        .iter()
        .filter(|v| !v.is_null())
        .map(|v| normalize(v, column.semantic_type, now))
        .collect::<Result<Vec<_>, _>>()?;

    if !has_null {
        return Ok(in_non_null(column, non_null));
    }
    // SQL `IN` never matches NULL.
    let null_part = eq(column, Value::Null);
    if non_null.is_empty() {
        Ok(null_part)
    } else {
        Ok(null_part.or(in_non_null(column, non_null)))
    }
}

/// Compile a case-insensitive substring search.
pub(crate) fn contains(column: &ColumnDescriptor, needle: &str) -> Result<Compiled, FilterErrorKind> {
    if !column.semantic_type.is_text() {
        return Err(FilterErrorKind::TypeMismatch {
            value: "string",
            column: column.semantic_type,
        });
    }
    let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
    Ok(Compiled::Expression(Condition::Like {
        expr: text_target(column),
        pattern: Value::String(pattern),
        negated: false,
    }))
}

/// Escape `LIKE` wildcards with backslashes.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `LOWER(col)`, unquoting JSON strings first.
fn text_target(column: &ColumnDescriptor) -> Expr {
    let expr = column.expression.clone();
    if column.semantic_type == SemanticType::JSONString {
        expr.json_unquote().lower()
    } else {
        expr.lower()
    }
}

/// The expression compared against a normalized value.
fn target(column: &ColumnDescriptor, value: &Value) -> Expr {
    if matches!(value, Value::String(_)) && column.semantic_type.is_text() {
        text_target(column)
    } else {
        column.expression.clone()
    }
}

fn eq(column: &ColumnDescriptor, value: Value) -> Compiled {
    let expr = column.expression.clone();
    let condition = match (column.semantic_type, value) {
        (SemanticType::JSONArray, Value::String(s)) => Condition::JsonArrayContains {
            column: expr,
            value: Value::String(s),
            fold_case: true,
        },
        (SemanticType::JSONArray, Value::Null) => Condition::JsonArrayContains {
            column: expr.clone(),
            value: Value::Null,
            fold_case: false,
        }
        .or(Condition::is_null(expr)),
        (SemanticType::JSONArray, value) => Condition::JsonArrayContains {
            column: expr,
            value,
            fold_case: false,
        },
        (ty, Value::Null) if ty.is_json() => {
            Condition::IsJsonNull(expr.clone()).or(Condition::is_null(expr))
        },
        (_, Value::Null) => Condition::is_null(expr),
        (_, value) => {
            let left = target(column, &value);
            if column.nullable {
                Condition::NullSafeEq {
                    left,
                    right: Expr::Param(value),
                }
            } else {
                Condition::eq(left, value)
            }
        },
    };
    Compiled::Expression(condition)
}

fn gt(column: &ColumnDescriptor, value: Value) -> Compiled {
    if value.is_null() {
        return if column.nullable {
            Compiled::Expression(Condition::is_not_null(column.expression.clone()))
        } else {
            Compiled::AlwaysTrue
        };
    }
    let greater = Condition::compare(target(column, &value), CompareOp::Gt, value);
    if column.nullable {
        // Keeps the negation (`$lte`) true for NULL rows.
        Compiled::Expression(Condition::is_not_null(column.expression.clone()).and(greater))
    } else {
        Compiled::Expression(greater)
    }
}

fn lt(column: &ColumnDescriptor, value: Value) -> Compiled {
    if value.is_null() {
        return Compiled::AlwaysFalse;
    }
    let less = Condition::compare(target(column, &value), CompareOp::Lt, value);
    if column.nullable {
        Compiled::Expression(Condition::is_null(column.expression.clone()).or(less))
    } else {
        Compiled::Expression(less)
    }
}

fn in_non_null(column: &ColumnDescriptor, values: Vec<Value>) -> Compiled {
    if column.semantic_type == SemanticType::JSONArray {
        return Compiled::Expression(Condition::JsonOverlaps {
            column: column.expression.clone(),
            values,
        });
    }
    match <[Value; 1]>::try_from(values) {
        Ok([value]) => Compiled::Expression(Condition::eq(target(column, &value), value)),
        Err(values) => {
            let expr = values
                .first()
                .map_or_else(|| column.expression.clone(), |v| target(column, v));
            Compiled::Expression(Condition::In {
                expr,
                values,
                negated: false,
            })
        },
    }
}
