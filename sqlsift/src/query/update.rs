//! UPDATE statement builder.

use crate::compile::Compiled;
use crate::dialect::Dialect;
use crate::error::RenderError;
use crate::expr::{Condition, Expr, RenderOptions, Renderer, Table, ToSql, Value};
use crate::validate::assert_valid_sql_identifier;

/// UPDATE statement.
///
/// Joins required by the WHERE clause are rendered after the table name
/// (MySQL multi-table update syntax).
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: Table,
    sets: Vec<(String, Expr)>,
    where_clause: Compiled,
}

impl Update {
    /// Update rows of `table`.
    ///
    /// # Panics
    ///
    /// Panics if the table name is not a valid SQL identifier.
    #[track_caller]
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: Table::new(table),
            sets: Vec::new(),
            where_clause: Compiled::AlwaysTrue,
        }
    }

    /// Assign `value` to `column`.
    ///
    /// # Panics
    ///
    /// Panics if the column name is not a valid SQL identifier.
    #[track_caller]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Expr>) -> Self {
        let column = column.into();
        assert_valid_sql_identifier(&column, "column");
        self.sets.push((column, value.into()));
        self
    }

    /// Assign several bound values at once.
    #[track_caller]
    pub fn set_many(mut self, pairs: Vec<(&str, Value)>) -> Self {
        for (column, value) in pairs {
            self = self.set(column, value);
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

    /// Static outcome of the WHERE clause; `Some(false)` updates nothing.
    #[must_use]
    pub const fn is_always(&self) -> Option<bool> {
        match self.where_clause {
            Compiled::AlwaysTrue => Some(true),
            Compiled::AlwaysFalse => Some(false),
            Compiled::Expression(_) => None,
        }
    }
}

impl ToSql for Update {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        if self.sets.is_empty() {
            return Err(RenderError::EmptyUpdate);
        }
        let inner = options.nested(Some(self.table.namespace().to_string()));
        let plain = RenderOptions::new();

        let mut sql = format!("UPDATE {}", self.table.sql());
        if let Compiled::Expression(condition) = &self.where_clause {
            for join in condition.joins() {
                sql.push(' ');
                sql.push_str(&join.render(renderer, &inner)?);
            }
        }

        let mut assignments = Vec::with_capacity(self.sets.len());
        for (column, value) in &self.sets {
            let value = value.render(renderer, &plain)?;
            assignments.push(format!("{column} = {value}"));
        }
        sql.push_str(" SET ");
        sql.push_str(&assignments.join(", "));

        match &self.where_clause {
            Compiled::AlwaysTrue => {},
            Compiled::AlwaysFalse => {
                sql.push_str(" WHERE ");
                sql.push_str(renderer.dialect().bool_lit(false));
            },
            Compiled::Expression(condition) => {
                if !condition.is_vacuous() {
                    sql.push_str(" WHERE ");
                    sql.push_str(&condition.render(renderer, &inner)?);
                }
            },
        }
        Ok(sql)
    }
}
