//! Boolean predicates.

use serde::{Deserialize, Serialize};

use crate::dialect::{Dialect, json_array_text};
use crate::error::RenderError;
use crate::query::Select;

use super::{Expr, Join, RenderOptions, Renderer, ToSql, Value};

/// Comparison operators, shared by the filter grammar and rendered predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=` / `$eq`
    #[serde(rename = "$eq")]
    Eq,
    /// `!=` / `$neq`
    #[serde(rename = "$neq")]
    Neq,
    /// `>` / `$gt`
    #[serde(rename = "$gt")]
    Gt,
    /// `>=` / `$gte`
    #[serde(rename = "$gte")]
    Gte,
    /// `<` / `$lt`
    #[serde(rename = "$lt")]
    Lt,
    /// `<=` / `$lte`
    #[serde(rename = "$lte")]
    Lte,
}

impl CompareOp {
    /// SQL operator.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Filter grammar operator.
    #[must_use]
    pub const fn as_operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Neq => "$neq",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }

    /// Parse a filter grammar operator.
    ///
    /// ```
    /// use sqlsift::CompareOp;
    ///
    /// assert_eq!(CompareOp::from_operator("$gte"), Some(CompareOp::Gte));
    /// assert_eq!(CompareOp::from_operator("$in"), None);
    /// ```
    #[must_use]
    pub fn from_operator(s: &str) -> Option<Self> {
        match s {
            "$eq" => Some(Self::Eq),
            "$neq" => Some(Self::Neq),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            _ => None,
        }
    }

    /// The operator whose result is the logical negation of this one.
    #[must_use]
    pub const fn inverse(self) -> Self {
        match self {
            Self::Eq => Self::Neq,
            Self::Neq => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Lte => Self::Gt,
            Self::Lt => Self::Gte,
            Self::Gte => Self::Lt,
        }
    }
}

/// A boolean predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `left op right`
    Compare {
        /// Left operand.
        left: Expr,
        /// Operator.
        op: CompareOp,
        /// Right operand.
        right: Expr,
    },
    /// Equality where two NULLs are equal.
    NullSafeEq {
        /// Left operand.
        left: Expr,
        /// Right operand.
        right: Expr,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        /// Tested expression.
        expr: Expr,
        /// `IS NOT NULL` when set.
        negated: bool,
    },
    /// The expression holds a stored JSON `null`.
    IsJsonNull(Expr),
    /// `expr [NOT] IN (values)`
    In {
        /// Tested expression.
        expr: Expr,
        /// Candidate values, bound as parameters.
        values: Vec<Value>,
        /// `NOT IN` when set.
        negated: bool,
    },
    /// `expr [NOT] LIKE pattern`
    Like {
        /// Tested expression.
        expr: Expr,
        /// Pattern, bound as a parameter.
        pattern: Value,
        /// `NOT LIKE` when set.
        negated: bool,
    },
    /// JSON array column contains `value`.
    JsonArrayContains {
        /// JSON array expression.
        column: Expr,
        /// Element to look for.
        value: Value,
        /// Compare strings case-insensitively.
        fold_case: bool,
    },
    /// JSON array column shares at least one element with `values`.
    JsonOverlaps {
        /// JSON array expression.
        column: Expr,
        /// Candidate elements.
        values: Vec<Value>,
    },
    /// `[NOT] EXISTS (query)`
    Exists {
        /// Correlated subquery.
        query: Box<Select>,
        /// `NOT EXISTS` when set.
        negated: bool,
    },
    /// A predicate over a joined table. The join is hoisted into the
    /// enclosing SELECT; without an inner predicate only the join remains.
    Joined {
        /// Join required by the predicate.
        join: Box<Join>,
        /// Predicate on the joined table.
        inner: Option<Box<Self>>,
    },
    /// All children hold.
    And(Vec<Self>),
    /// At least one child holds.
    Or(Vec<Self>),
    /// Negation.
    Not(Box<Self>),
}

impl Condition {
    /// `left op right`
    pub fn compare(left: impl Into<Expr>, op: CompareOp, right: impl Into<Expr>) -> Self {
        Self::Compare {
            left: left.into(),
            op,
            right: right.into(),
        }
    }

    /// `left = right`
    pub fn eq(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::compare(left, CompareOp::Eq, right)
    }

    /// `expr IS NULL`
    pub fn is_null(expr: impl Into<Expr>) -> Self {
        Self::IsNull {
            expr: expr.into(),
            negated: false,
        }
    }

    /// `expr IS NOT NULL`
    pub fn is_not_null(expr: impl Into<Expr>) -> Self {
        Self::IsNull {
            expr: expr.into(),
            negated: true,
        }
    }

    /// `EXISTS (query)`
    #[must_use]
    pub fn exists(query: Select) -> Self {
        Self::Exists {
            query: Box::new(query),
            negated: false,
        }
    }

    /// Conjunction, flattening nested `And`s.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut left), Self::And(right)) => {
                left.extend(right);
                Self::And(left)
            },
            (Self::And(mut left), right) => {
                left.push(right);
                Self::And(left)
            },
            (left, Self::And(mut right)) => {
                right.insert(0, left);
                Self::And(right)
            },
            (left, right) => Self::And(vec![left, right]),
        }
    }

    /// Disjunction, flattening nested `Or`s.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut left), Self::Or(right)) => {
                left.extend(right);
                Self::Or(left)
            },
            (Self::Or(mut left), right) => {
                left.push(right);
                Self::Or(left)
            },
            (left, Self::Or(mut right)) => {
                right.insert(0, left);
                Self::Or(right)
            },
            (left, right) => Self::Or(vec![left, right]),
        }
    }

    /// Logical negation.
    ///
    /// Single predicates invert in place; anything else is wrapped in
    /// `NOT (..)`. A double negation unwraps.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::Compare { left, op, right } => Self::Compare {
                left,
                op: op.inverse(),
                right,
            },
            Self::IsNull { expr, negated } => Self::IsNull {
                expr,
                negated: !negated,
            },
            Self::In {
                expr,
                values,
                negated,
            } => Self::In {
                expr,
                values,
                negated: !negated,
            },
            Self::Like {
                expr,
                pattern,
                negated,
            } => Self::Like {
                expr,
                pattern,
                negated: !negated,
            },
            Self::Exists { query, negated } => Self::Exists {
                query,
                negated: !negated,
            },
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Joins required by `Joined` nodes, in first-use order.
    #[must_use]
    pub fn joins(&self) -> Vec<&Join> {
        let mut joins = Vec::new();
        self.collect_joins(&mut joins);
        joins
    }

    fn collect_joins<'a>(&'a self, out: &mut Vec<&'a Join>) {
        match self {
            Self::Joined { join, inner } => {
                if !out.contains(&&**join) {
                    out.push(&**join);
                }
                if let Some(inner) = inner {
                    inner.collect_joins(out);
                }
            },
            Self::And(children) | Self::Or(children) => {
                for child in children {
                    child.collect_joins(out);
                }
            },
            Self::Not(inner) => inner.collect_joins(out),
            _ => {},
        }
    }

    /// Returns `true` when the condition only requires joins and adds no predicate.
    #[must_use]
    pub fn is_vacuous(&self) -> bool {
        match self {
            Self::Joined { inner: None, .. } => true,
            Self::And(children) => !children.is_empty() && children.iter().all(Self::is_vacuous),
            _ => false,
        }
    }

    /// Returns `true` when the rendered text needs no parentheses inside AND/OR.
    #[must_use]
    pub fn is_single(&self) -> bool {
        match self {
            Self::And(children) | Self::Or(children) => match children.as_slice() {
                [only] => only.is_single(),
                _ => false,
            },
            Self::Joined {
                inner: Some(inner), ..
            } => inner.is_single(),
            _ => true,
        }
    }

    fn render_child<D: Dialect>(
        child: &Self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let sql = child.render(renderer, options)?;
        Ok(if child.is_single() {
            sql
        } else {
            format!("({sql})")
        })
    }
}

impl ToSql for Condition {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let dialect = renderer.dialect();
        Ok(match self {
            Self::Compare { left, op, right } => {
                let left = left.render(renderer, options)?;
                let right = right.render(renderer, options)?;
                format!("{left} {} {right}", op.as_sql())
            },
            Self::NullSafeEq { left, right } => {
                let left = left.render(renderer, options)?;
                let right = right.render(renderer, options)?;
                dialect.null_safe_eq(&left, &right)
            },
            Self::IsNull { expr, negated } => {
                let expr = expr.render(renderer, options)?;
                if *negated {
                    format!("{expr} IS NOT NULL")
                } else {
                    format!("{expr} IS NULL")
                }
            },
            Self::IsJsonNull(expr) => {
                let expr = expr.render(renderer, options)?;
                dialect
                    .json_null_check(&expr)
                    .unwrap_or_else(|| format!("{expr} IS NULL"))
            },
            Self::In {
                expr,
                values,
                negated,
            } => {
                let field = expr.render(renderer, options)?;
                if values.is_empty() {
                    return Ok(dialect.bool_lit(*negated).to_string());
                }
                let (sql, params) = if *negated {
                    dialect.not_in_clause(&field, values, renderer.next_index())
                } else {
                    dialect.in_clause(&field, values, renderer.next_index())
                };
                renderer.extend(params);
                sql
            },
            Self::Like {
                expr,
                pattern,
                negated,
            } => {
                let field = expr.render(renderer, options)?;
                let placeholder = renderer.push(pattern.clone());
                dialect.like(&field, &placeholder, *negated)
            },
            Self::JsonArrayContains {
                column,
                value,
                fold_case,
            } => {
                let column = column.render(renderer, options)?;
                let placeholder = renderer.push(dialect.json_array_param(value, *fold_case));
                dialect.json_array_contains(&column, &placeholder, *fold_case)
            },
            Self::JsonOverlaps { column, values } => {
                let column = column.render(renderer, options)?;
                let placeholder = renderer.push(json_array_text(values));
                dialect.json_overlaps(&column, &placeholder)
            },
            Self::Exists { query, negated } => {
                let inner = query.render(renderer, options)?;
                if *negated {
                    format!("NOT EXISTS ({inner})")
                } else {
                    format!("EXISTS ({inner})")
                }
            },
            Self::Joined { inner, .. } => match inner {
                Some(inner) => inner.render(renderer, options)?,
                None => dialect.bool_lit(true).to_string(),
            },
            Self::And(children) => {
                let parts = children
                    .iter()
                    .filter(|c| !c.is_vacuous())
                    .map(|c| Self::render_child(c, renderer, options))
                    .collect::<Result<Vec<_>, _>>()?;
                if parts.is_empty() {
                    dialect.bool_lit(true).to_string()
                } else {
                    parts.join(" AND ")
                }
            },
            Self::Or(children) => {
                if children.is_empty() {
                    return Ok(dialect.bool_lit(false).to_string());
                }
                let parts = children
                    .iter()
                    .map(|c| Self::render_child(c, renderer, options))
                    .collect::<Result<Vec<_>, _>>()?;
                parts.join(" OR ")
            },
            Self::Not(inner) => format!("NOT ({})", inner.render(renderer, options)?),
        })
    }
}
