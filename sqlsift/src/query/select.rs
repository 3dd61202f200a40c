//! SELECT statement builder.

use crate::compile::Compiled;
use crate::dialect::Dialect;
use crate::error::RenderError;
use crate::expr::{Column, Condition, Expr, Join, RenderOptions, Renderer, Table, ToSql};
use crate::sort::SortDir;
use crate::validate::assert_valid_sql_identifier;

/// Alias of the single column produced by aggregate wrappers.
pub const AGGREGATE_ALIAS: &str = "c";

/// A projected expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    /// Projected expression.
    pub expr: Expr,
    /// `AS alias`.
    pub alias: Option<String>,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    /// Sorted expression.
    pub expr: Expr,
    /// Direction.
    pub dir: SortDir,
}

impl OrderBy {
    /// Create a term.
    pub fn new(expr: impl Into<Expr>, dir: SortDir) -> Self {
        Self {
            expr: expr.into(),
            dir,
        }
    }

    /// Ascending term.
    pub fn asc(expr: impl Into<Expr>) -> Self {
        Self::new(expr, SortDir::Asc)
    }

    /// Descending term.
    pub fn desc(expr: impl Into<Expr>) -> Self {
        Self::new(expr, SortDir::Desc)
    }
}

impl ToSql for OrderBy {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let expr = self.expr.render(renderer, options)?;
        let nulls = renderer.dialect().nulls_order(self.dir);
        Ok(format!("{expr} {}{nulls}", self.dir.as_sql()))
    }
}

/// SELECT statement.
///
/// ```
/// use sqlsift::{Mysql, OrderBy, Select, ToSql};
///
/// let sql = Select::new()
///     .from("members")
///     .columns(&["id", "firstName"])
///     .order_by(OrderBy::asc(sqlsift::Expr::column("id")))
///     .limit(10)
///     .to_sql(Mysql)
///     .unwrap();
///
/// assert_eq!(
///     sql.sql,
///     "SELECT members.id, members.firstName FROM members ORDER BY members.id ASC LIMIT 10"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    columns: Vec<SelectItem>,
    from: Option<Table>,
    joins: Vec<Join>,
    where_clause: Compiled,
    group_by: Vec<Expr>,
    having: Option<Condition>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    max_execution_time: Option<u64>,
}

impl Select {
    /// Empty SELECT.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select from `table`.
    #[track_caller]
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.from = Some(Table::new(table));
        self
    }

    /// Select from `table` under `alias`.
    #[track_caller]
    #[allow(clippy::wrong_self_convention)]
    pub fn from_as(mut self, table: impl Into<String>, alias: impl Into<String>) -> Self {
        self.from = Some(Table::aliased(table, alias));
        self
    }

    /// Add a column of the FROM table.
    #[track_caller]
    pub fn column(self, name: impl Into<String>) -> Self {
        self.select(Expr::Column(Column::new(name)))
    }

    /// Add several columns of the FROM table.
    #[track_caller]
    pub fn columns(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.column(*name);
        }
        self
    }

    /// Add a projected expression.
    pub fn select(mut self, expr: impl Into<Expr>) -> Self {
        self.columns.push(SelectItem {
            expr: expr.into(),
            alias: None,
        });
        self
    }

    /// Add a projected expression under `alias`.
    #[track_caller]
    pub fn select_as(mut self, expr: impl Into<Expr>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        assert_valid_sql_identifier(&alias, "alias");
        self.columns.push(SelectItem {
            expr: expr.into(),
            alias: Some(alias),
        });
        self
    }

    /// Add a join. A join equal to one already present is ignored.
    pub fn join(mut self, join: Join) -> Self {
        if !self.joins.contains(&join) {
            self.joins.push(join);
        }
        self
    }

    /// AND a condition into the WHERE clause.
    pub fn where_condition(self, condition: Condition) -> Self {
        self.where_compiled(Compiled::Expression(condition))
    }

    /// AND a compiled filter into the WHERE clause.
    pub fn where_compiled(mut self, compiled: Compiled) -> Self {
        self.where_clause = std::mem::take(&mut self.where_clause).and(compiled);
        self
    }

    /// Add a GROUP BY expression.
    pub fn group_by(mut self, expr: impl Into<Expr>) -> Self {
        self.group_by.push(expr.into());
        self
    }

    /// Set the HAVING condition.
    pub fn having(mut self, condition: Condition) -> Self {
        self.having = Some(condition);
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Attach an execution time annotation (dialects without hints ignore it).
    pub fn max_execution_time(mut self, ms: u64) -> Self {
        self.max_execution_time = Some(ms);
        self
    }

    /// The FROM table.
    #[must_use]
    pub const fn table(&self) -> Option<&Table> {
        self.from.as_ref()
    }

    /// The WHERE clause.
    #[must_use]
    pub const fn where_clause(&self) -> &Compiled {
        &self.where_clause
    }

    /// Static outcome of the WHERE clause.
    ///
    /// `Some(false)` means the statement can never return rows.
    #[must_use]
    pub const fn is_always(&self) -> Option<bool> {
        match self.where_clause {
            Compiled::AlwaysTrue => Some(true),
            Compiled::AlwaysFalse => Some(false),
            Compiled::Expression(_) => None,
        }
    }

    /// The LIMIT.
    #[must_use]
    pub const fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    /// The ORDER BY terms.
    #[must_use]
    pub fn get_order_by(&self) -> &[OrderBy] {
        &self.order_by
    }

    /// Turn into `SELECT COUNT(*) AS c ...` (or `COUNT(expr)`), dropping order and paging.
    #[must_use]
    pub fn into_count(self, expr: Option<Expr>) -> Self {
        self.into_aggregate(Expr::Count(expr.map(Box::new)))
    }

    /// Turn into `SELECT SUM(expr) AS c ...`, dropping order and paging.
    #[must_use]
    pub fn into_sum(self, expr: Expr) -> Self {
        self.into_aggregate(Expr::Sum(Box::new(expr)))
    }

    fn into_aggregate(self, aggregate: Expr) -> Self {
        Self {
            columns: vec![SelectItem {
                expr: aggregate,
                alias: Some(AGGREGATE_ALIAS.to_string()),
            }],
            order_by: Vec::new(),
            limit: None,
            offset: None,
            ..self
        }
    }

    /// Turn into `SELECT EXISTS (SELECT 1 ...) AS c`.
    #[must_use]
    pub fn into_exists(self) -> Self {
        let hint = self.max_execution_time;
        let inner = Self {
            columns: vec![SelectItem {
                expr: Expr::Keyword("1"),
                alias: None,
            }],
            order_by: Vec::new(),
            limit: None,
            offset: None,
            max_execution_time: None,
            ..self
        };
        Self {
            max_execution_time: hint,
            ..Self::new().select_as(Expr::Exists(Box::new(inner)), AGGREGATE_ALIAS)
        }
    }

    /// Explicit joins followed by the joins the WHERE clause requires.
    fn all_joins(&self) -> Vec<&Join> {
        let mut joins: Vec<&Join> = self.joins.iter().collect();
        if let Compiled::Expression(condition) = &self.where_clause {
            for join in condition.joins() {
                if !joins.contains(&join) {
                    joins.push(join);
                }
            }
        }
        joins
    }
}

impl ToSql for Select {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let dialect = renderer.dialect();
        let joins = self.all_joins();
        if self.from.is_none()
            && (!joins.is_empty() || !matches!(self.where_clause, Compiled::AlwaysTrue))
        {
            return Err(RenderError::MissingFrom);
        }
        let inner = options.nested(self.from.as_ref().map(|t| t.namespace().to_string()));

        let mut sql = String::from("SELECT ");
        if let Some(hint) = self
            .max_execution_time
            .and_then(|ms| dialect.execution_time_hint(ms))
        {
            sql.push_str(&hint);
            sql.push(' ');
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let mut items = Vec::with_capacity(self.columns.len());
            for item in &self.columns {
                let expr = item.expr.render(renderer, &inner)?;
                items.push(match &item.alias {
                    Some(alias) => format!("{expr} AS {alias}"),
                    None => expr,
                });
            }
            sql.push_str(&items.join(", "));
        }

        if let Some(table) = &self.from {
            sql.push_str(" FROM ");
            sql.push_str(&table.sql());
        }

        for join in joins {
            sql.push(' ');
            sql.push_str(&join.render(renderer, &inner)?);
        }

        match &self.where_clause {
            Compiled::AlwaysTrue => {},
            Compiled::AlwaysFalse => {
                sql.push_str(" WHERE ");
                sql.push_str(dialect.bool_lit(false));
            },
            Compiled::Expression(condition) => {
                if !condition.is_vacuous() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&condition.render(renderer, &inner)?);
                }
            },
        }

        if !self.group_by.is_empty() {
            let parts = self
                .group_by
                .iter()
                .map(|e| e.render(renderer, &inner))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" GROUP BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(having) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&having.render(renderer, &inner)?);
        }

        if !self.order_by.is_empty() {
            let parts = self
                .order_by
                .iter()
                .map(|o| o.render(renderer, &inner))
                .collect::<Result<Vec<_>, _>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&parts.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Mysql, Postgres, Sqlite};
    use crate::expr::{CompareOp, Value};

    fn members() -> Select {
        Select::new().from("members").columns(&["id", "name"])
    }

    #[test]
    fn test_simple_select() {
        let sql = members().to_sql(Mysql).unwrap();
        assert_eq!(sql.sql, "SELECT members.id, members.name FROM members");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_star_when_no_columns() {
        let sql = Select::new().from("members").to_sql(Mysql).unwrap();
        assert_eq!(sql.sql, "SELECT * FROM members");
    }

    #[test]
    fn test_where_and_limit() {
        let sql = members()
            .where_condition(Condition::compare(
                Expr::column("age"),
                CompareOp::Gte,
                Expr::param(18),
            ))
            .limit(20)
            .offset(40)
            .to_sql(Postgres)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT members.id, members.name FROM members WHERE members.age >= $1 LIMIT 20 OFFSET 40"
        );
        assert_eq!(sql.params, vec![Value::Int(18)]);
    }

    #[test]
    fn test_always_true_where_is_omitted() {
        let sql = members()
            .where_compiled(Compiled::AlwaysTrue)
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(sql.sql, "SELECT members.id, members.name FROM members");
    }

    #[test]
    fn test_always_false_where_dominates() {
        let select = members()
            .where_condition(Condition::eq(Expr::column("id"), Expr::param(1)))
            .where_compiled(Compiled::AlwaysFalse);
        assert_eq!(select.is_always(), Some(false));
        let sql = select.to_sql(Sqlite).unwrap();
        assert_eq!(sql.sql, "SELECT members.id, members.name FROM members WHERE 0");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_where_joins_are_hoisted_once() {
        let join = Join::left(
            Table::new("organizations"),
            Condition::eq(Column::new("id"), Column::parent("organizationId")),
        );
        let named = |v: &str| Condition::Joined {
            join: Box::new(join.clone()),
            inner: Some(Box::new(Condition::eq(
                Expr::qualified("organizations", "name"),
                Expr::param(v),
            ))),
        };
        let sql = Select::new()
            .from("test_table")
            .join(join.clone())
            .where_condition(named("a").or(named("b")))
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT * FROM test_table LEFT JOIN organizations ON organizations.id = test_table.organizationId \
             WHERE organizations.name = ? OR organizations.name = ?"
        );
    }

    #[test]
    fn test_vacuous_where_keeps_join_only() {
        let join = Join::left(
            Table::new("organizations"),
            Condition::eq(Column::new("id"), Column::parent("organizationId")),
        );
        let sql = Select::new()
            .from("test_table")
            .where_condition(Condition::Joined {
                join: Box::new(join),
                inner: None,
            })
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT * FROM test_table LEFT JOIN organizations ON organizations.id = test_table.organizationId"
        );
    }

    #[test]
    fn test_into_count_clears_order_and_paging() {
        let sql = members()
            .order_by(OrderBy::asc(Expr::column("id")))
            .limit(10)
            .offset(5)
            .into_count(None);
        assert_eq!(sql.get_limit(), None);
        assert!(sql.get_order_by().is_empty());
        let sql = sql.to_sql(Mysql).unwrap();
        assert_eq!(sql.sql, "SELECT COUNT(*) AS c FROM members");
    }

    #[test]
    fn test_into_sum() {
        let sql = Select::new()
            .from("orders")
            .where_condition(Condition::is_null(Expr::column("deletedAt")))
            .into_sum(Expr::column("price"))
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT SUM(orders.price) AS c FROM orders WHERE orders.deletedAt IS NULL"
        );
    }

    #[test]
    fn test_into_exists() {
        let sql = members()
            .where_condition(Condition::eq(Expr::column("id"), Expr::param(3)))
            .limit(5)
            .into_exists()
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT EXISTS (SELECT 1 FROM members WHERE members.id = ?) AS c"
        );
        assert_eq!(sql.params, vec![Value::Int(3)]);
    }

    #[test]
    fn test_execution_time_hint() {
        let select = members().max_execution_time(5000);
        assert_eq!(
            select.to_sql(Mysql).unwrap().sql,
            "SELECT /*+ MAX_EXECUTION_TIME(5000) */ members.id, members.name FROM members"
        );
        assert_eq!(
            select.to_sql(Postgres).unwrap().sql,
            "SELECT members.id, members.name FROM members"
        );
    }

    #[test]
    fn test_order_by_nulls_first_on_postgres() {
        let sql = members()
            .order_by(OrderBy::desc(Expr::column("birthDay")))
            .order_by(OrderBy::asc(Expr::column("id")))
            .to_sql(Postgres)
            .unwrap();
        assert!(sql.sql.ends_with(
            "ORDER BY members.birthDay DESC NULLS LAST, members.id ASC NULLS FIRST"
        ));
    }

    #[test]
    fn test_group_by_having() {
        let sql = Select::new()
            .from("registrations")
            .column("groupId")
            .select_as(Expr::Count(None), "total")
            .group_by(Expr::column("groupId"))
            .having(Condition::compare(Expr::Count(None), CompareOp::Gt, Expr::param(5)))
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT registrations.groupId, COUNT(*) AS total FROM registrations \
             GROUP BY registrations.groupId HAVING COUNT(*) > ?"
        );
    }

    #[test]
    fn test_aliased_from() {
        let sql = Select::new()
            .from_as("organizations", "o")
            .column("id")
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(sql.sql, "SELECT o.id FROM organizations o");
    }

    #[test]
    fn test_missing_from() {
        let err = Select::new()
            .where_condition(Condition::eq(Expr::column("a"), Expr::param(1)))
            .to_sql(Mysql)
            .unwrap_err();
        assert_eq!(err, RenderError::MissingFrom);
    }

    #[test]
    fn test_scalar_subquery_is_correlated() {
        let count = Select::new()
            .from("registrations")
            .where_condition(Condition::eq(Column::new("memberId"), Column::parent("id")))
            .into_count(None);
        let sql = Select::new()
            .from("members")
            .column("id")
            .select_as(Expr::Subquery(Box::new(count)), "registrationCount")
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT members.id, (SELECT COUNT(*) AS c FROM registrations \
             WHERE registrations.memberId = members.id) AS registrationCount FROM members"
        );
    }
}
