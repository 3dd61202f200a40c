//! Keyset pagination condition generation.

use crate::error::{CursorError, Error, SortError};
use crate::expr::{CompareOp, Condition, Expr, Value};
use crate::filter::{self, CompareValue, Filter};

use super::{Cursor, SortDir, SortField, SortRegistry};

/// Keyset pagination condition.
///
/// Selects the rows strictly after (or before) a sort-key tuple in the
/// order of a resolved sort specification.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysetCondition {
    /// The resolved sort specification, tie-break included.
    pub sort: Vec<SortField>,
    /// The tuple values, one per sort field.
    pub values: Vec<CompareValue>,
    /// `true` for rows after the tuple, `false` for rows before it.
    pub forward: bool,
}

impl KeysetCondition {
    /// Rows after `cursor` in the order of `sort`.
    pub fn after(sort: &[SortField], cursor: &Cursor) -> Result<Self, CursorError> {
        Self::new(sort, cursor, true)
    }

    /// Rows before `cursor` in the order of `sort`.
    pub fn before(sort: &[SortField], cursor: &Cursor) -> Result<Self, CursorError> {
        Self::new(sort, cursor, false)
    }

    fn new(sort: &[SortField], cursor: &Cursor, forward: bool) -> Result<Self, CursorError> {
        Ok(Self {
            sort: sort.to_vec(),
            values: cursor.values_for(sort)?,
            forward,
        })
    }

    /// The condition as a filter on the sort keys.
    ///
    /// `(a, b, c) > (1, 2, 3)` expands to
    /// `a > 1 OR (a = 1 AND b > 2) OR (a = 1 AND b = 2 AND c > 3)`, with each
    /// key compared in its own direction. The filter is compiled like any
    /// other, so it compares the way the filter fields of the keys do, which
    /// need not be how the keys are ordered. Page queries use
    /// [`KeysetCondition::to_condition`].
    #[must_use]
    pub fn to_filter(&self) -> Filter {
        let mut branches = Vec::with_capacity(self.sort.len());
        for (i, (field, value)) in self.sort.iter().zip(&self.values).enumerate() {
            let mut branch: Vec<Filter> = self
                .sort
                .iter()
                .zip(&self.values)
                .take(i)
                .map(|(f, v)| filter::field(f.key.clone(), filter::eq(v.clone())))
                .collect();
            branch.push(filter::field(
                field.key.clone(),
                filter::compare(self.operator(field.dir), value.clone()),
            ));
            branches.push(match branch.len() {
                1 => branch.remove(0),
                _ => Filter::And(branch),
            });
        }
        match branches.len() {
            1 => branches.remove(0),
            _ => Filter::Or(branches),
        }
    }

    /// The condition over the `ORDER BY` expressions of `sorts`.
    ///
    /// Each key is compared through the expression it is sorted by, against
    /// the value its definition reads from a row, so the predicate and the
    /// ordering cannot disagree. NULL is the smallest value, as in
    /// `ORDER BY`. A branch that no row can satisfy (below NULL) is left
    /// out; when none is left the condition is `FALSE`.
    pub fn to_condition<T>(&self, sorts: &SortRegistry<T>) -> Result<Condition, Error> {
        let mut keys = Vec::with_capacity(self.sort.len());
        for (field, value) in self.sort.iter().zip(&self.values) {
            let definition = sorts
                .get(&field.key)
                .ok_or_else(|| SortError::UnknownSortKey(field.key.clone()))?;
            keys.push((
                definition.order_by(field.dir).expr,
                definition.is_nullable(),
                field.dir,
                bound(value)?,
            ));
        }

        let mut branches = Vec::with_capacity(keys.len());
        for (i, (expr, nullable, dir, value)) in keys.iter().enumerate() {
            let Some(step) = beyond(expr, *nullable, self.operator(*dir), value) else {
                continue;
            };
            let ties = keys
                .iter()
                .take(i)
                .map(|(expr, _, _, value)| tie(expr, value))
                .reduce(Condition::and);
            branches.push(match ties {
                Some(ties) => ties.and(step),
                None => step,
            });
        }
        Ok(branches
            .into_iter()
            .reduce(Condition::or)
            .unwrap_or(Condition::Or(Vec::new())))
    }

    const fn operator(&self, dir: SortDir) -> CompareOp {
        match (self.forward, dir) {
            (true, SortDir::Asc) | (false, SortDir::Desc) => CompareOp::Gt,
            (true, SortDir::Desc) | (false, SortDir::Asc) => CompareOp::Lt,
        }
    }
}

fn bound(value: &CompareValue) -> Result<Value, CursorError> {
    Ok(match value {
        CompareValue::Null => Value::Null,
        CompareValue::Bool(b) => Value::Bool(*b),
        CompareValue::Int(n) => Value::Int(*n),
        CompareValue::Float(f) => Value::Float(*f),
        CompareValue::String(s) => Value::String(s.clone()),
        CompareValue::Datetime(at) => Value::Datetime(*at),
        CompareValue::Now => return Err(CursorError::InvalidFormat),
    })
}

fn tie(expr: &Expr, value: &Value) -> Condition {
    if value.is_null() {
        Condition::is_null(expr.clone())
    } else {
        Condition::eq(expr.clone(), Expr::param(value.clone()))
    }
}

/// `expr op value` with NULL below every value. `None` when nothing is below NULL.
fn beyond(expr: &Expr, nullable: bool, op: CompareOp, value: &Value) -> Option<Condition> {
    match (op, value.is_null()) {
        (CompareOp::Lt, true) => None,
        (_, true) => Some(Condition::is_not_null(expr.clone())),
        (CompareOp::Lt, false) if nullable => Some(
            Condition::is_null(expr.clone())
                .or(Condition::compare(expr.clone(), op, Expr::param(value.clone()))),
        ),
        _ => Some(Condition::compare(expr.clone(), op, Expr::param(value.clone()))),
    }
}
