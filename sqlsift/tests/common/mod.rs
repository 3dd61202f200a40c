//! Shared SQLite driver for integration tests.

use rusqlite::types::Value as SqliteValue;
use rusqlite::{Connection, params_from_iter};
use sqlsift::{Driver, PlanStep, Sql, Sqlite, Value};

// =============================================================================
// Driver
// =============================================================================

pub struct SqliteDriver {
    conn: Connection,
}

impl SqliteDriver {
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn bind(value: &Value) -> SqliteValue {
    match value {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(i64::from(*b)),
        Value::Int(i) => SqliteValue::Integer(*i),
        Value::Float(f) => SqliteValue::Real(*f),
        Value::String(s) => SqliteValue::Text(s.clone()),
        Value::Datetime(dt) => SqliteValue::Text(dt.to_rfc3339()),
        Value::Array(_) => unreachable!("SQLite parameters are expanded"),
    }
}

impl Driver for SqliteDriver {
    type Dialect = Sqlite;
    type Row = Vec<SqliteValue>;
    type Error = rusqlite::Error;

    fn dialect(&self) -> Sqlite {
        Sqlite
    }

    fn query(&self, sql: &Sql) -> Result<Vec<Self::Row>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&sql.sql)?;
        let width = stmt.column_count();
        let rows = stmt.query_map(params_from_iter(sql.params.iter().map(bind)), |row| {
            (0..width).map(|i| row.get::<_, SqliteValue>(i)).collect()
        })?;
        rows.collect()
    }

    fn query_scalar(&self, sql: &Sql) -> Result<Option<f64>, rusqlite::Error> {
        self.conn
            .query_row(&sql.sql, params_from_iter(sql.params.iter().map(bind)), |row| {
                row.get::<_, Option<f64>>(0)
            })
    }

    fn execute(&self, sql: &Sql) -> Result<u64, rusqlite::Error> {
        let changed = self
            .conn
            .execute(&sql.sql, params_from_iter(sql.params.iter().map(bind)))?;
        Ok(changed as u64)
    }

    fn explain(&self, sql: &Sql) -> Result<Vec<PlanStep>, rusqlite::Error> {
        let plan = sql.explain(Sqlite);
        let mut stmt = self.conn.prepare(&plan.sql)?;
        let details = stmt.query_map(params_from_iter(plan.params.iter().map(bind)), |row| {
            row.get::<_, String>(3)
        })?;
        details
            .map(|detail| {
                let detail = detail?;
                let mut words = detail.split_whitespace();
                let access = words.next().unwrap_or_default().to_string();
                let table = words.next().unwrap_or_default().to_string();
                Ok(PlanStep {
                    full_scan: access == "SCAN" && !detail.contains("USING"),
                    table,
                    access,
                })
            })
            .collect()
    }
}
