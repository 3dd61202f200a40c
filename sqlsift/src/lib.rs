// =============================================================================
// CRATE-LEVEL QUALITY LINTS
// =============================================================================
#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
// =============================================================================
// CLIPPY CONFIGURATION
// =============================================================================
#![allow(clippy::doc_markdown)] // Code items in docs
#![allow(clippy::missing_errors_doc)] // # Errors sections - doc-heavy
#![allow(clippy::missing_panics_doc)] // Registry builders document panics in prose
#![allow(clippy::module_name_repetitions)] // Type names matching module - acceptable
#![allow(clippy::return_self_not_must_use)] // Builder pattern methods return Self by design
#![allow(clippy::must_use_candidate)] // Builder methods - fluent API doesn't need must_use
#![allow(clippy::match_same_arms)] // Intentional for clarity in some match expressions
#![allow(clippy::format_push_string)] // String building style preference
#![allow(clippy::cast_possible_truncation)] // Intentional in SQL context
#![allow(clippy::cast_sign_loss)] // Intentional in SQL context
#![allow(clippy::double_must_use)] // Functions returning must_use types can have their own docs

//! # sqlsift - JSON Filters Compiled to Parameterized SQL
//!
//! Clients send a filter tree as JSON. A per-entity [`FilterRegistry`]
//! declares which fields exist and how each one maps to SQL: a column, a
//! JSON path, a correlated `EXISTS` over a child table, a join, a map with
//! dynamic keys or a hand-written compiler. The [`Compiler`] turns the tree
//! into a [`Compiled`] predicate whose values are always bound parameters.
//!
//! ## Quick Start
//!
//! ```
//! use sqlsift::prelude::*;
//!
//! let filters = FilterRegistry::new()
//!     .column("id", ColumnDescriptor::column("id", SemanticType::Number))
//!     .column("firstName", ColumnDescriptor::column("firstName", SemanticType::String))
//!     .column("age", ColumnDescriptor::column("age", SemanticType::Number));
//!
//! let compiler = Compiler::new(&CompilerConfig::default());
//! let filter = parse_filter(r#"{"firstName": {"$in": ["Ann", "Bob"]}, "age": {"$gt": 30}}"#).unwrap();
//! let select = Select::new()
//!     .from("members")
//!     .columns(&["id", "firstName"])
//!     .where_compiled(compiler.compile(&filter, &filters).unwrap());
//!
//! let sql = select.to_sql(Mysql).unwrap();
//! assert_eq!(
//!     sql.sql,
//!     "SELECT members.id, members.firstName FROM members \
//!      WHERE LOWER(members.firstName) IN (?, ?) AND members.age > ?"
//! );
//! assert_eq!(sql.params.len(), 3);
//! ```
//!
//! ## Filter Operators
//!
//! | Operator | SQL | Example |
//! |----------|-----|---------|
//! | implicit | `=` | `"status": "active"` |
//! | `$eq` / `$neq` | null-safe `=` / its negation | `"deletedAt": {"$eq": null}` |
//! | `$gt` `$gte` `$lt` `$lte` | `>` `>=` `<` `<=` | `"age": {"$gte": 21}` |
//! | `$in` | `IN` | `"status": {"$in": ["a", "b"]}` |
//! | `$contains` | `LIKE` | `"name": {"$contains": "an"}` |
//! | `$elemMatch` | correlated `EXISTS` | `"organizations": {"$elemMatch": {"role": "admin"}}` |
//! | `$and` `$or` `$not` | `AND` `OR` `NOT` | `"$or": [{"a": 1}, {"b": 2}]` |
//! | `{"$": "$now"}` | current instant | `"expiresAt": {"$gt": {"$": "$now"}}` |
//!
//! Text comparisons are case-insensitive. Filters that can never match
//! compile to [`Compiled::AlwaysFalse`] and the [`Executor`] skips them
//! without a round-trip.
//!
//! ## Keyset Pagination
//!
//! A [`SortRegistry`] maps sort keys to SQL and to row values. Every
//! resolved sort ends with the registry's unique tie-break key, and a
//! [`Cursor`] holds the sort-key tuple of the last row of a page.
//!
//! ```
//! use sqlsift::prelude::*;
//!
//! struct Member {
//!     id: i64,
//!     age: i64,
//! }
//!
//! let filters = FilterRegistry::new()
//!     .column("id", ColumnDescriptor::column("id", SemanticType::Number))
//!     .column("age", ColumnDescriptor::column("age", SemanticType::Number));
//! let sorts = SortRegistry::<Member>::builder("id")
//!     .key("id", SortDefinition::column("id", |m: &Member| m.id.into()))
//!     .key("age", SortDefinition::column("age", |m: &Member| m.age.into()).not_null())
//!     .build()
//!     .unwrap();
//!
//! let config = CompilerConfig::default();
//! let compiler = Compiler::new(&config);
//! let first = PageRequest::new(&config)
//!     .sort(SortField::parse_sort_string("-age").unwrap())
//!     .limit(2);
//!
//! let rows = [Member { id: 4, age: 40 }, Member { id: 9, age: 40 }];
//! let next = first.next_page(&rows, &sorts).unwrap().unwrap();
//! let select = next
//!     .build_select(Select::new().from("members"), &filters, &sorts, &compiler)
//!     .unwrap();
//!
//! assert_eq!(
//!     select.to_sql(Mysql).unwrap().sql,
//!     "SELECT * FROM members WHERE members.age < ? OR (members.age = ? AND members.id > ?) \
//!      ORDER BY members.age DESC, members.id ASC LIMIT 2"
//! );
//! ```

mod compile;
mod config;
mod diagnostics;
mod dialect;
mod error;
mod expr;
pub mod filter;
mod query;
mod sort;
mod validate;

pub use compile::{
    ChildrenForKey, ColumnDescriptor, ColumnForKey, Compiled, Compiler, CustomCompiler,
    FilterDefinition, FilterRegistry, SemanticType,
};
pub use config::{CompilerConfig, Config, DiagnosticsConfig};
pub use diagnostics::{
    Batches, Driver, ExecError, Executor, NoopLogger, PlanStep, QueryLogger, SlowQueryLogger,
    SlowQueryReport,
};
pub use dialect::{Dialect, Mysql, Postgres, Sqlite};
pub use error::{
    ConfigError, CursorError, Error, FieldPath, FilterError, FilterErrorKind, RegistryError,
    RenderError, SortError,
};
pub use expr::{
    Column, CompareOp, Condition, Expr, Join, JoinKind, JsonPath, Namespace, RenderOptions,
    Renderer, Sql, Table, ToSql, Value,
};
pub use filter::{CompareValue, Filter, merge_filters, parse_filter, parse_filter_value};
pub use query::{AGGREGATE_ALIAS, Insert, OrderBy, Select, SelectItem, Update};
pub use sort::{
    Cursor, GetValue, KeysetCondition, OrderByFor, PageInfo, PageRequest, SortDefinition,
    SortDir, SortField, SortRegistry, SortRegistryBuilder,
};
pub use validate::{
    assert_valid_json_path, assert_valid_sql_identifier, is_valid_json_path,
    is_valid_sql_identifier,
};

/// Prelude module for convenient imports.
///
/// ```
/// use sqlsift::prelude::*;
///
/// let select = Select::new().from("members").column("id");
/// assert_eq!(select.to_sql(Sqlite).unwrap().sql, "SELECT members.id FROM members");
/// ```
pub mod prelude {
    pub use crate::filter;
    pub use crate::{
        Column, ColumnDescriptor, CompareOp, CompareValue, Compiled, Compiler, CompilerConfig,
        Condition, Config, Cursor, Dialect, Driver, Error, Executor, Expr, Filter, FilterError,
        FilterRegistry, Insert, Join, KeysetCondition, Mysql, OrderBy, PageInfo, PageRequest,
        Postgres, Select, SemanticType, SortDefinition, SortDir, SortField, SortRegistry, Sqlite,
        Table, ToSql, Update, Value, parse_filter,
    };
}


// ============================================================================
// API Contract Tests (compile-time assertions)
// ============================================================================
