//! SQL dialect implementations for MySQL, Postgres and `SQLite`.
//!
//! Each dialect handles the specific syntax differences between databases.
//! Every method receives already-rendered SQL fragments and placeholders;
//! no method ever formats a caller value into the returned text.

use crate::expr::Value;
use crate::sort::SortDir;

/// SQL dialect trait for database-specific syntax.
pub trait Dialect: Clone + Copy + std::fmt::Debug {
    /// Format a parameter placeholder (e.g., `?` for MySQL, `$1` for Postgres, `?1` for `SQLite`).
    fn param(&self, idx: usize) -> String;

    /// Format a boolean literal.
    fn bool_lit(&self, val: bool) -> &'static str;

    /// Format an IN clause with multiple values.
    /// Returns the SQL fragment (e.g., `= ANY($1)` or `IN (?, ?)`) and the params it binds.
    fn in_clause(&self, field: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>);

    /// Format a NOT IN clause.
    fn not_in_clause(
        &self,
        field: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>);

    /// Equality that treats two NULLs as equal.
    fn null_safe_eq(&self, left: &str, right: &str) -> String;

    /// Extract a JSON document at `path` (a placeholder or a quoted literal).
    fn json_extract(&self, target: &str, path: &str) -> String;

    /// Turn an extracted JSON scalar into its native SQL text.
    fn json_unquote(&self, expr: &str) -> String;

    /// Test for a stored JSON `null`.
    ///
    /// Returns `None` when JSON null already extracts as SQL `NULL`.
    fn json_null_check(&self, expr: &str) -> Option<String>;

    /// The JSON string at `path` as SQL text, `NULL` for any other JSON type.
    ///
    /// `target` and `path` are repeated in the output, so neither may carry
    /// a placeholder.
    fn json_string(&self, target: &str, path: &str) -> String;

    /// Membership test for a set-valued JSON column.
    ///
    /// With `fold_case` the column is compared case-insensitively against a
    /// lowercased string parameter.
    fn json_array_contains(&self, column: &str, placeholder: &str, fold_case: bool) -> String;

    /// Encode the parameter used by [`json_array_contains`](Self::json_array_contains).
    fn json_array_param(&self, value: &Value, fold_case: bool) -> Value;

    /// Overlap test between a JSON array column and a JSON array parameter.
    fn json_overlaps(&self, column: &str, placeholder: &str) -> String;

    /// `LIKE` with backslash as escape character.
    fn like(&self, field: &str, placeholder: &str, negated: bool) -> String;

    /// Optimizer hint limiting execution time, placed right after `SELECT`.
    fn execution_time_hint(&self, ms: u64) -> Option<String>;

    /// Null ordering suffix so `NULL` always sorts as the smallest value.
    fn nulls_order(&self, dir: SortDir) -> &'static str;

    /// Upsert tail for an INSERT statement.
    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String;

    /// Prefix that turns a statement into a plan request.
    fn explain_prefix(&self) -> &'static str;
}

fn json_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or_else(|| "null".to_string(), |n| n.to_string()),
        Value::String(s) => serde_json::Value::String(s.clone()).to_string(),
        Value::Datetime(d) => serde_json::Value::String(d.to_rfc3339()).to_string(),
        Value::Array(items) => format!(
            "[{}]",
            items.iter().map(json_text).collect::<Vec<_>>().join(",")
        ),
    }
}

/// Encode a list of values as one JSON array text parameter.
pub(crate) fn json_array_text(values: &[Value]) -> Value {
    Value::String(json_text(&Value::Array(values.to_vec())))
}

/// MySQL dialect (positional `?` placeholders).
#[derive(Debug, Clone, Copy, Default)]
pub struct Mysql;

impl Dialect for Mysql {
    #[inline]
    fn param(&self, _idx: usize) -> String {
        "?".to_string()
    }

    #[inline]
    fn bool_lit(&self, val: bool) -> &'static str {
        if val { "TRUE" } else { "FALSE" }
    }

    fn in_clause(&self, field: &str, values: &[Value], _start_idx: usize) -> (String, Vec<Value>) {
        let placeholders = vec!["?"; values.len()].join(", ");
        (format!("{field} IN ({placeholders})"), values.to_vec())
    }

    fn not_in_clause(
        &self,
        field: &str,
        values: &[Value],
        _start_idx: usize,
    ) -> (String, Vec<Value>) {
        let placeholders = vec!["?"; values.len()].join(", ");
        (format!("{field} NOT IN ({placeholders})"), values.to_vec())
    }

    #[inline]
    fn null_safe_eq(&self, left: &str, right: &str) -> String {
        format!("{left} <=> {right}")
    }

    #[inline]
    fn json_extract(&self, target: &str, path: &str) -> String {
        format!("JSON_EXTRACT({target}, {path})")
    }

    #[inline]
    fn json_unquote(&self, expr: &str) -> String {
        format!("JSON_UNQUOTE({expr})")
    }

    fn json_null_check(&self, expr: &str) -> Option<String> {
        Some(format!("{expr} = CAST('null' AS JSON)"))
    }

    fn json_string(&self, target: &str, path: &str) -> String {
        let value = self.json_extract(target, path);
        format!(
            "CASE WHEN JSON_TYPE({value}) = 'STRING' THEN {} END",
            self.json_unquote(&value)
        )
    }

    fn json_array_contains(&self, column: &str, placeholder: &str, fold_case: bool) -> String {
        if fold_case {
            format!("JSON_SEARCH(LOWER({column}), 'one', {placeholder}) IS NOT NULL")
        } else {
            format!("JSON_CONTAINS({column}, {placeholder})")
        }
    }

    fn json_array_param(&self, value: &Value, fold_case: bool) -> Value {
        if fold_case {
            value.clone()
        } else {
            Value::String(json_text(value))
        }
    }

    #[inline]
    fn json_overlaps(&self, column: &str, placeholder: &str) -> String {
        format!("JSON_OVERLAPS({column}, {placeholder})")
    }

    fn like(&self, field: &str, placeholder: &str, negated: bool) -> String {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        format!("{field} {op} {placeholder}")
    }

    fn execution_time_hint(&self, ms: u64) -> Option<String> {
        Some(format!("/*+ MAX_EXECUTION_TIME({ms}) */"))
    }

    #[inline]
    fn nulls_order(&self, _dir: SortDir) -> &'static str {
        // MySQL already sorts NULL first ascending, last descending
        ""
    }

    fn upsert_clause(&self, _conflict_columns: &[String], update_columns: &[String]) -> String {
        let sets: Vec<String> = update_columns
            .iter()
            .map(|c| format!("{c} = VALUES({c})"))
            .collect();
        format!("ON DUPLICATE KEY UPDATE {}", sets.join(", "))
    }

    #[inline]
    fn explain_prefix(&self) -> &'static str {
        "EXPLAIN "
    }
}

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("${idx}")
    }

    #[inline]
    fn bool_lit(&self, val: bool) -> &'static str {
        if val { "TRUE" } else { "FALSE" }
    }

    fn in_clause(&self, field: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        // Postgres: field = ANY($1) with array parameter
        let sql = format!("{field} = ANY(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    fn not_in_clause(
        &self,
        field: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        let sql = format!("{field} != ALL(${start_idx})");
        (sql, vec![Value::Array(values.to_vec())])
    }

    #[inline]
    fn null_safe_eq(&self, left: &str, right: &str) -> String {
        format!("{left} IS NOT DISTINCT FROM {right}")
    }

    #[inline]
    fn json_extract(&self, target: &str, path: &str) -> String {
        format!("jsonb_path_query_first({target}, {path}::jsonpath)")
    }

    #[inline]
    fn json_unquote(&self, expr: &str) -> String {
        format!("({expr} #>> '{{}}')")
    }

    fn json_null_check(&self, expr: &str) -> Option<String> {
        Some(format!("{expr} = 'null'::jsonb"))
    }

    fn json_string(&self, target: &str, path: &str) -> String {
        let value = self.json_extract(target, path);
        format!(
            "CASE WHEN jsonb_typeof({value}) = 'string' THEN {} END",
            self.json_unquote(&value)
        )
    }

    fn json_array_contains(&self, column: &str, placeholder: &str, fold_case: bool) -> String {
        if fold_case {
            format!(
                "EXISTS (SELECT 1 FROM jsonb_array_elements_text({column}) AS e(v) WHERE LOWER(e.v) = {placeholder})"
            )
        } else {
            format!("{column} @> {placeholder}::jsonb")
        }
    }

    fn json_array_param(&self, value: &Value, fold_case: bool) -> Value {
        if fold_case {
            value.clone()
        } else {
            json_array_text(std::slice::from_ref(value))
        }
    }

    fn json_overlaps(&self, column: &str, placeholder: &str) -> String {
        format!(
            "EXISTS (SELECT 1 FROM jsonb_array_elements({column}) AS a(v) \
             JOIN jsonb_array_elements({placeholder}::jsonb) AS b(v) ON a.v = b.v)"
        )
    }

    fn like(&self, field: &str, placeholder: &str, negated: bool) -> String {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        format!("{field} {op} {placeholder}")
    }

    fn execution_time_hint(&self, _ms: u64) -> Option<String> {
        // statement_timeout is a session setting owned by the driver
        None
    }

    #[inline]
    fn nulls_order(&self, dir: SortDir) -> &'static str {
        match dir {
            SortDir::Asc => " NULLS FIRST",
            SortDir::Desc => " NULLS LAST",
        }
    }

    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String {
        let sets: Vec<String> = update_columns
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        format!(
            "ON CONFLICT ({}) DO UPDATE SET {}",
            conflict_columns.join(", "),
            sets.join(", ")
        )
    }

    #[inline]
    fn explain_prefix(&self) -> &'static str {
        "EXPLAIN "
    }
}

/// `SQLite` dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn param(&self, idx: usize) -> String {
        format!("?{idx}")
    }

    #[inline]
    fn bool_lit(&self, val: bool) -> &'static str {
        if val { "1" } else { "0" }
    }

    fn in_clause(&self, field: &str, values: &[Value], start_idx: usize) -> (String, Vec<Value>) {
        // SQLite: field IN (?1, ?2, ?3) with expanded parameters
        let placeholders: Vec<String> = (0..values.len())
            .map(|i| format!("?{}", start_idx + i))
            .collect();
        let sql = format!("{} IN ({})", field, placeholders.join(", "));
        (sql, values.to_vec())
    }

    fn not_in_clause(
        &self,
        field: &str,
        values: &[Value],
        start_idx: usize,
    ) -> (String, Vec<Value>) {
        let placeholders: Vec<String> = (0..values.len())
            .map(|i| format!("?{}", start_idx + i))
            .collect();
        let sql = format!("{} NOT IN ({})", field, placeholders.join(", "));
        (sql, values.to_vec())
    }

    #[inline]
    fn null_safe_eq(&self, left: &str, right: &str) -> String {
        format!("{left} IS {right}")
    }

    #[inline]
    fn json_extract(&self, target: &str, path: &str) -> String {
        format!("json_extract({target}, {path})")
    }

    #[inline]
    fn json_unquote(&self, expr: &str) -> String {
        // json_extract already returns native SQL values for scalars
        expr.to_string()
    }

    fn json_null_check(&self, _expr: &str) -> Option<String> {
        None
    }

    fn json_string(&self, target: &str, path: &str) -> String {
        format!("CASE WHEN json_type({target}, {path}) = 'text' THEN json_extract({target}, {path}) END")
    }

    fn json_array_contains(&self, column: &str, placeholder: &str, fold_case: bool) -> String {
        if fold_case {
            format!("EXISTS (SELECT 1 FROM json_each({column}) WHERE LOWER(json_each.value) = {placeholder})")
        } else {
            format!("EXISTS (SELECT 1 FROM json_each({column}) WHERE json_each.value IS {placeholder})")
        }
    }

    fn json_array_param(&self, value: &Value, _fold_case: bool) -> Value {
        match value {
            // json_each exposes JSON booleans as 1/0
            Value::Bool(b) => Value::Int(i64::from(*b)),
            other => other.clone(),
        }
    }

    fn json_overlaps(&self, column: &str, placeholder: &str) -> String {
        format!(
            "EXISTS (SELECT 1 FROM json_each({column}) AS a \
             JOIN json_each({placeholder}) AS b ON a.value IS b.value)"
        )
    }

    fn like(&self, field: &str, placeholder: &str, negated: bool) -> String {
        let op = if negated { "NOT LIKE" } else { "LIKE" };
        format!("{field} {op} {placeholder} ESCAPE '\\'")
    }

    fn execution_time_hint(&self, _ms: u64) -> Option<String> {
        None
    }

    #[inline]
    fn nulls_order(&self, _dir: SortDir) -> &'static str {
        ""
    }

    fn upsert_clause(&self, conflict_columns: &[String], update_columns: &[String]) -> String {
        let sets: Vec<String> = update_columns
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        format!(
            "ON CONFLICT ({}) DO UPDATE SET {}",
            conflict_columns.join(", "),
            sets.join(", ")
        )
    }

    #[inline]
    fn explain_prefix(&self) -> &'static str {
        "EXPLAIN QUERY PLAN "
    }
}
