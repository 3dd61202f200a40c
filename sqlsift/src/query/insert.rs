//! INSERT statement builder.

use crate::dialect::Dialect;
use crate::error::RenderError;
use crate::expr::{Expr, RenderOptions, Renderer, Table, ToSql, Value};
use crate::validate::assert_valid_sql_identifier;

/// INSERT statement with multi-row values and optional upsert.
///
/// ```
/// use sqlsift::{Insert, Mysql, ToSql, Value};
///
/// let sql = Insert::into("members")
///     .columns(&["id", "firstName"])
///     .values(vec![Value::Int(1), "Ann".into()])
///     .values(vec![Value::Int(2), "Bob".into()])
///     .upsert(&["id"], &["firstName"])
///     .to_sql(Mysql)
///     .unwrap();
///
/// assert_eq!(
///     sql.sql,
///     "INSERT INTO members (id, firstName) VALUES (?, ?), (?, ?) \
///      ON DUPLICATE KEY UPDATE firstName = VALUES(firstName)"
/// );
/// assert_eq!(sql.params.len(), 4);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: Table,
    columns: Vec<String>,
    rows: Vec<Vec<Expr>>,
    upsert: Option<Upsert>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Upsert {
    conflict: Vec<String>,
    update: Vec<String>,
}

impl Insert {
    /// Insert into `table`.
    ///
    /// # Panics
    ///
    /// Panics if the table name is not a valid SQL identifier.
    #[track_caller]
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: Table::new(table),
            columns: Vec::new(),
            rows: Vec::new(),
            upsert: None,
        }
    }

    /// Set the columns for insertion.
    ///
    /// # Panics
    ///
    /// Panics if any column name is not a valid SQL identifier.
    #[track_caller]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        for col in columns {
            assert_valid_sql_identifier(col, "column");
        }
        self.columns = columns.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Add a row of bound values.
    pub fn values(mut self, row: Vec<Value>) -> Self {
        self.rows.push(row.into_iter().map(Expr::Param).collect());
        self
    }

    /// Add multiple rows of bound values.
    pub fn values_many(mut self, rows: Vec<Vec<Value>>) -> Self {
        for row in rows {
            self = self.values(row);
        }
        self
    }

    /// Add a row of arbitrary expressions, e.g. `NOW()` keywords.
    pub fn row(mut self, row: Vec<Expr>) -> Self {
        self.rows.push(row);
        self
    }

    /// Update `update_columns` when a row conflicts on `conflict_columns`.
    ///
    /// MySQL infers the conflict from unique keys; the other dialects use
    /// `conflict_columns` as the `ON CONFLICT` target.
    ///
    /// # Panics
    ///
    /// Panics if any column name is not a valid SQL identifier.
    #[track_caller]
    pub fn upsert(mut self, conflict_columns: &[&str], update_columns: &[&str]) -> Self {
        for col in conflict_columns.iter().chain(update_columns) {
            assert_valid_sql_identifier(col, "upsert column");
        }
        self.upsert = Some(Upsert {
            conflict: conflict_columns.iter().map(|s| (*s).to_string()).collect(),
            update: update_columns.iter().map(|s| (*s).to_string()).collect(),
        });
        self
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl ToSql for Insert {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        _options: &RenderOptions,
    ) -> Result<String, RenderError> {
        if self.columns.is_empty() || self.rows.is_empty() {
            return Err(RenderError::EmptyInsert);
        }
        let plain = RenderOptions::new();

        let mut groups = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if row.len() != self.columns.len() {
                return Err(RenderError::RowWidthMismatch {
                    expected: self.columns.len(),
                    actual: row.len(),
                });
            }
            let values = row
                .iter()
                .map(|e| e.render(renderer, &plain))
                .collect::<Result<Vec<_>, _>>()?;
            groups.push(format!("({})", values.join(", ")));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table.sql(),
            self.columns.join(", "),
            groups.join(", ")
        );

        if let Some(upsert) = &self.upsert {
            if !upsert.update.is_empty() {
                sql.push(' ');
                sql.push_str(
                    &renderer
                        .dialect()
                        .upsert_clause(&upsert.conflict, &upsert.update),
                );
            }
        }

        Ok(sql)
    }
}
