//! Filter compiler.
//!
//! Walks a [`Filter`] tree against a [`FilterRegistry`] and produces a
//! [`Compiled`] predicate. Compilation is pure: it performs no I/O and never
//! mutates its inputs, so one registry can serve any number of threads.
//!
//! # Example
//!
//! ```
//! use sqlsift::{ColumnDescriptor, Compiler, CompilerConfig, FilterRegistry, Mysql, SemanticType, ToSql};
//!
//! let registry = FilterRegistry::new()
//!     .column("age", ColumnDescriptor::column("age", SemanticType::Number))
//!     .column("name", ColumnDescriptor::column("name", SemanticType::String));
//!
//! let compiler = Compiler::new(&CompilerConfig::default());
//! let filter = serde_json::json!({"name": "Ann", "age": {"$not": {"$lt": 18}}});
//! let sql = compiler.compile_json(&filter, &registry).unwrap().to_sql(Mysql).unwrap();
//!
//! assert_eq!(sql.sql, "LOWER(name) = ? AND age >= ?");
//! ```

mod column;
mod normalize;
mod operators;
mod registry;

use chrono::{DateTime, Utc};

use crate::config::CompilerConfig;
use crate::dialect::Dialect;
use crate::error::{FieldPath, FilterError, FilterErrorKind, RenderError};
use crate::expr::{Condition, RenderOptions, Renderer, ToSql};
use crate::filter::{Filter, parse_filter_with_depth};
use crate::query::Select;

pub use column::{ColumnDescriptor, SemanticType};
pub use registry::{ChildrenForKey, ColumnForKey, CustomCompiler, FilterDefinition, FilterRegistry};

/// Result of every compiler step.
///
/// Statically decided branches are kept out of the predicate tree so that
/// composites can drop them without emitting SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Compiled {
    /// A predicate that has to be evaluated by the database.
    Expression(Condition),
    /// Matches every row.
    #[default]
    AlwaysTrue,
    /// Matches no row.
    AlwaysFalse,
}

impl Compiled {
    /// Conjunction. `AlwaysFalse` dominates, `AlwaysTrue` is the identity.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::AlwaysFalse, _) | (_, Self::AlwaysFalse) => Self::AlwaysFalse,
            (Self::AlwaysTrue, x) | (x, Self::AlwaysTrue) => x,
            (Self::Expression(a), Self::Expression(b)) => Self::Expression(a.and(b)),
        }
    }

    /// Disjunction. `AlwaysTrue` dominates, `AlwaysFalse` is the identity.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::AlwaysTrue, _) | (_, Self::AlwaysTrue) => Self::AlwaysTrue,
            (Self::AlwaysFalse, x) | (x, Self::AlwaysFalse) => x,
            (Self::Expression(a), Self::Expression(b)) => Self::Expression(a.or(b)),
        }
    }

    /// Logical negation.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Self::AlwaysTrue => Self::AlwaysFalse,
            Self::AlwaysFalse => Self::AlwaysTrue,
            Self::Expression(c) => Self::Expression(c.negate()),
        }
    }

    /// The predicate as a condition; constants become the empty `AND`/`OR`.
    #[must_use]
    pub fn into_condition(self) -> Condition {
        match self {
            Self::Expression(c) => c,
            Self::AlwaysTrue => Condition::And(Vec::new()),
            Self::AlwaysFalse => Condition::Or(Vec::new()),
        }
    }

    /// Returns `true` for [`Compiled::AlwaysTrue`].
    #[must_use]
    pub const fn is_always_true(&self) -> bool {
        matches!(self, Self::AlwaysTrue)
    }

    /// Returns `true` for [`Compiled::AlwaysFalse`].
    #[must_use]
    pub const fn is_always_false(&self) -> bool {
        matches!(self, Self::AlwaysFalse)
    }
}

impl From<bool> for Compiled {
    fn from(value: bool) -> Self {
        if value {
            Self::AlwaysTrue
        } else {
            Self::AlwaysFalse
        }
    }
}

impl From<Condition> for Compiled {
    fn from(condition: Condition) -> Self {
        Self::Expression(condition)
    }
}

/// Constants render as the empty query: there is nothing to send.
impl ToSql for Compiled {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        match self {
            Self::Expression(condition) => condition.render(renderer, options),
            Self::AlwaysTrue | Self::AlwaysFalse => Ok(String::new()),
        }
    }
}

/// Field names visible at one level of the filter tree.
#[derive(Clone, Copy)]
enum Fields<'a> {
    None,
    Registry(&'a FilterRegistry),
    Wildcard {
        column_for_key: &'a ColumnForKey,
        children_for_key: Option<&'a ChildrenForKey>,
    },
}

impl<'a> Fields<'a> {
    fn of(registry: Option<&'a FilterRegistry>) -> Self {
        registry.map_or(Self::None, Self::Registry)
    }
}

struct Scope<'a> {
    fields: Fields<'a>,
    column: Option<&'a ColumnDescriptor>,
    path: FieldPath,
}

impl Scope<'_> {
    fn error(&self, kind: FilterErrorKind) -> FilterError {
        FilterError::new(kind, self.path.clone())
    }

    fn column(&self, operator: &str) -> Result<&ColumnDescriptor, FilterError> {
        self.column
            .ok_or_else(|| self.error(FilterErrorKind::OperatorNotAllowed(operator.to_string())))
    }
}

/// Compiles filter trees. Cheap to construct; holds only limits and the
/// instant `$now` resolves to.
#[derive(Debug, Clone)]
pub struct Compiler {
    max_in_values: usize,
    max_depth: usize,
    query_timeout_ms: Option<u64>,
    now: DateTime<Utc>,
}

impl Compiler {
    /// Create a compiler with the limits of `config`. `$now` is the current time.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            max_in_values: config.max_in_values,
            max_depth: config.max_depth,
            query_timeout_ms: config.query_timeout_ms,
            now: Utc::now(),
        }
    }

    /// Execution time annotation for statements built with this compiler.
    #[must_use]
    pub const fn query_timeout_ms(&self) -> Option<u64> {
        self.query_timeout_ms
    }

    /// Pin the instant `$now` resolves to.
    #[must_use]
    pub const fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Compile `filter` against `registry`.
    ///
    /// Either the whole filter compiles or an error naming the offending
    /// field path is returned; there is no partial result.
    pub fn compile(&self, filter: &Filter, registry: &FilterRegistry) -> Result<Compiled, FilterError> {
        let scope = Scope {
            fields: Fields::Registry(registry),
            column: None,
            path: FieldPath::root(),
        };
        self.node(filter, &scope, 1)
    }

    /// Parse and compile a JSON filter.
    pub fn compile_json(
        &self,
        filter: &serde_json::Value,
        registry: &FilterRegistry,
    ) -> Result<Compiled, FilterError> {
        let filter = parse_filter_with_depth(filter, self.max_depth)?;
        self.compile(&filter, registry)
    }

    fn node(&self, filter: &Filter, scope: &Scope<'_>, depth: usize) -> Result<Compiled, FilterError> {
        if depth > self.max_depth {
            return Err(scope.error(FilterErrorKind::TooDeep {
                max: self.max_depth,
            }));
        }
        match filter {
            Filter::And(children) => {
                let mut result = Compiled::AlwaysTrue;
                for child in children {
                    result = result.and(self.node(child, scope, depth + 1)?);
                    if result.is_always_false() {
                        break;
                    }
                }
                Ok(result)
            },
            Filter::Or(children) => {
                let mut result = Compiled::AlwaysFalse;
                for child in children {
                    result = result.or(self.node(child, scope, depth + 1)?);
                    if result.is_always_true() {
                        break;
                    }
                }
                Ok(result)
            },
            Filter::Not(inner) => Ok(self.node(inner, scope, depth + 1)?.negate()),
            Filter::Field { name, filter } => self.field(name, filter, scope, depth + 1),
            Filter::Compare { op, value } => {
                let column = scope.column(op.as_operator())?;
                operators::compare(column, *op, value, self.now).map_err(|kind| scope.error(kind))
            },
            Filter::In(values) => {
                let column = scope.column("$in")?;
                operators::in_values(column, values, self.max_in_values, self.now)
                    .map_err(|kind| scope.error(kind))
            },
            Filter::Contains(needle) => {
                let column = scope.column("$contains")?;
                operators::contains(column, needle).map_err(|kind| scope.error(kind))
            },
            Filter::ElemMatch(_) => Err(scope.error(FilterErrorKind::UnexpectedElemMatch)),
            Filter::Marker => Err(scope.error(FilterErrorKind::UnresolvedMarker)),
        }
    }

    /// Compile `filter` below the field `name`, which may be a dotted path.
    fn field(
        &self,
        name: &str,
        filter: &Filter,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Compiled, FilterError> {
        match scope.fields {
            Fields::Registry(registry) => {
                if let Some(definition) = registry.get(name) {
                    return self.definition(name, definition, None, filter, scope, depth);
                }
                if let Some((head, rest)) = name.split_once('.')
                    && let Some(definition) = registry.get(head)
                {
                    return self.definition(head, definition, Some(rest), filter, scope, depth);
                }
                let head = name.split_once('.').map_or(name, |(head, _)| head);
                Err(FilterError::new(
                    FilterErrorKind::UnknownField(head.to_string()),
                    scope.path.child(head),
                ))
            },
            Fields::Wildcard {
                column_for_key,
                children_for_key,
            } => {
                let (key, rest) = match name.split_once('.') {
                    Some((key, rest)) => (key, Some(rest)),
                    None => (name, None),
                };
                let column = column_for_key(key);
                let children = children_for_key.map(|children_for_key| children_for_key(key));
                let inner = Scope {
                    fields: Fields::of(children.as_ref()),
                    column: Some(&column),
                    path: scope.path.child(key),
                };
                self.within(rest, filter, &inner, depth)
            },
            Fields::None => Err(FilterError::new(
                FilterErrorKind::UnknownField(name.to_string()),
                scope.path.child(name),
            )),
        }
    }

    /// Continue with the remaining dotted path, or with the filter itself.
    fn within(
        &self,
        rest: Option<&str>,
        filter: &Filter,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Compiled, FilterError> {
        match rest {
            Some(rest) => self.field(rest, filter, scope, depth + 1),
            None => self.node(filter, scope, depth + 1),
        }
    }

    fn definition(
        &self,
        name: &str,
        definition: &FilterDefinition,
        rest: Option<&str>,
        filter: &Filter,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Compiled, FilterError> {
        let path = scope.path.child(name);
        match definition {
            FilterDefinition::Column { column, children } => {
                let inner = Scope {
                    fields: Fields::of(children.as_ref()),
                    column: Some(column),
                    path,
                };
                self.within(rest, filter, &inner, depth)
            },
            FilterDefinition::Nested(registry) => {
                let inner = Scope {
                    fields: Fields::Registry(registry),
                    column: None,
                    path,
                };
                self.within(rest, filter, &inner, depth)
            },
            FilterDefinition::Exists { base, registry } => {
                let inner = Scope {
                    fields: Fields::Registry(registry),
                    column: None,
                    path,
                };
                self.relation(base, rest, filter, &inner, depth)
            },
            FilterDefinition::Joined {
                join,
                registry,
                relation_always_exists,
            } => {
                let inner = Scope {
                    fields: Fields::Registry(registry),
                    column: None,
                    path,
                };
                let body = match (rest, filter) {
                    (None, Filter::ElemMatch(body)) => body.as_ref(),
                    _ => filter,
                };
                Ok(match self.within(rest, body, &inner, depth)? {
                    Compiled::AlwaysFalse => Compiled::AlwaysFalse,
                    Compiled::AlwaysTrue if *relation_always_exists => Compiled::AlwaysTrue,
                    Compiled::AlwaysTrue => Compiled::Expression(Condition::Joined {
                        join: Box::new(join.clone()),
                        inner: None,
                    }),
                    Compiled::Expression(condition) => Compiled::Expression(Condition::Joined {
                        join: Box::new(join.clone()),
                        inner: Some(Box::new(condition)),
                    }),
                })
            },
            FilterDefinition::Wildcard {
                column_for_key,
                children_for_key,
            } => {
                let inner = Scope {
                    fields: Fields::Wildcard {
                        column_for_key,
                        children_for_key: children_for_key.as_ref(),
                    },
                    column: None,
                    path,
                };
                self.within(rest, filter, &inner, depth)
            },
            FilterDefinition::Custom(compiler) => match rest {
                None => compiler(filter, &path),
                Some(rest) => compiler(
                    &Filter::Field {
                        name: rest.to_string(),
                        filter: Box::new(filter.clone()),
                    },
                    &path,
                ),
            },
        }
    }

    /// Compile a relation filter to a correlated `EXISTS`.
    ///
    /// `$not` directly on the relation negates the existence check, so
    /// `{"groups": {"$not": {"$elemMatch": f}}}` means no related row matches `f`.
    fn relation(
        &self,
        base: &Select,
        rest: Option<&str>,
        filter: &Filter,
        scope: &Scope<'_>,
        depth: usize,
    ) -> Result<Compiled, FilterError> {
        if rest.is_none() {
            match filter {
                Filter::Not(inner) => {
                    return Ok(self.relation(base, None, inner, scope, depth + 1)?.negate());
                },
                Filter::ElemMatch(inner) => {
                    return Ok(exists(base, self.node(inner, scope, depth + 1)?));
                },
                _ => {},
            }
        }
        Ok(exists(base, self.within(rest, filter, scope, depth)?))
    }
}

fn exists(base: &Select, inner: Compiled) -> Compiled {
    match inner {
        Compiled::AlwaysFalse => Compiled::AlwaysFalse,
        // Still asserts that a related row exists.
        Compiled::AlwaysTrue => Compiled::Expression(Condition::exists(base.clone())),
        Compiled::Expression(condition) => {
            Compiled::Expression(Condition::exists(base.clone().where_condition(condition)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Mysql, Postgres};
    use crate::expr::{Column, Expr, Join, JsonPath, Table, Value};
    use crate::filter;
    use serde_json::json;

    fn records_value(key: &str) -> Expr {
        Expr::column("settings")
            .json_extract(JsonPath::fixed("$.records"))
            .json_extract(JsonPath::for_key(key))
    }

    fn settings() -> FilterRegistry {
        FilterRegistry::new()
            .column_with_children(
                "dog",
                ColumnDescriptor::json("settings", "$.dog", SemanticType::JSONObject),
                FilterRegistry::new().column(
                    "name",
                    ColumnDescriptor::json("settings", "$.dog.name", SemanticType::JSONString),
                ),
            )
            .wildcard(
                "records",
                |key| ColumnDescriptor::new(records_value(key), SemanticType::JSONObject).nullable(),
                |key| {
                    FilterRegistry::new().column(
                        "name",
                        ColumnDescriptor::new(
                            records_value(key).json_extract(JsonPath::fixed("$.name")),
                            SemanticType::JSONString,
                        )
                        .nullable(),
                    )
                },
            )
    }

    fn organizations() -> FilterRegistry {
        FilterRegistry::new()
            .column("id", ColumnDescriptor::column("id", SemanticType::Number))
            .column("name", ColumnDescriptor::column("name", SemanticType::String))
    }

    fn group_join() -> Join {
        Join::left(
            Table::new("groups"),
            Condition::eq(Column::new("id"), Column::parent("groupId")),
        )
    }

    fn registry() -> FilterRegistry {
        let organization_base = Select::new()
            .from_as("organizations", "o")
            .select(Expr::Keyword("1"))
            .where_condition(Condition::eq(Column::parent("organizationId"), Column::new("id")));

        FilterRegistry::new()
            .column("id", ColumnDescriptor::column("id", SemanticType::Number))
            .column("name", ColumnDescriptor::column("name", SemanticType::String).nullable())
            .column("age", ColumnDescriptor::column("age", SemanticType::Number).nullable())
            .column("createdAt", ColumnDescriptor::column("createdAt", SemanticType::Datetime))
            .column("tags", ColumnDescriptor::column("tags", SemanticType::JSONArray).nullable())
            .nested("settings", settings())
            .exists("organizations", organization_base, organizations())
            .joined(
                "group",
                group_join(),
                FilterRegistry::new().column(
                    "name",
                    ColumnDescriptor::new(Expr::qualified("groups", "name"), SemanticType::String),
                ),
                false,
            )
    }

    fn compiler() -> Compiler {
        Compiler::new(&CompilerConfig::default()).with_now(DateTime::UNIX_EPOCH)
    }

    fn compile(filter: serde_json::Value) -> Result<Compiled, FilterError> {
        compiler().compile_json(&filter, &registry())
    }

    fn sql(filter: serde_json::Value) -> (String, Vec<Value>) {
        let sql = compile(filter).unwrap().to_sql(Mysql).unwrap();
        (sql.sql, sql.params)
    }

    #[test]
    fn test_in_null_split() {
        let (text, params) = sql(json!({"name": {"$in": [null, "a", "b"]}}));
        assert_eq!(text, "name IS NULL OR LOWER(name) IN (?, ?)");
        assert_eq!(params, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_in_bound() {
        let ok: Vec<i64> = (0..1000).collect();
        assert!(compile(json!({"id": {"$in": ok}})).is_ok());

        let too_many: Vec<i64> = (0..1001).collect();
        let err = compile(json!({"id": {"$in": too_many}})).unwrap_err();
        assert_eq!(err.code(), "invalid_filter");
        assert_eq!(
            err.kind,
            FilterErrorKind::TooManyValues {
                max: 1000,
                actual: 1001
            }
        );
        assert_eq!(err.path.to_string(), "id");
    }

    #[test]
    fn test_always_false_elision() {
        let compiled = compile(json!({"$and": [{"id": {"$lt": null}}]})).unwrap();
        assert_eq!(compiled, Compiled::AlwaysFalse);
        let sql = compiled.to_sql(Mysql).unwrap();
        assert_eq!(sql.sql, "");
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_exists_with_always_true_inner() {
        let compiled = compile(json!({"organizations": {"$elemMatch": {"id": {"$gte": null}}}})).unwrap();
        let options = RenderOptions::new().default_namespace("parent");
        let sql = compiled.to_sql_with(Mysql, &options).unwrap();
        assert_eq!(
            sql.sql,
            "EXISTS (SELECT 1 FROM organizations o WHERE parent.organizationId = o.id)"
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_exists_with_inner_filter() {
        let compiled = compile(json!({"organizations": {"$elemMatch": {"name": "Acme"}}})).unwrap();
        let sql = Select::new()
            .from("members")
            .column("id")
            .where_compiled(compiled)
            .to_sql(Postgres)
            .unwrap();
        assert_eq!(
            sql.sql,
            "SELECT members.id FROM members WHERE EXISTS (SELECT 1 FROM organizations o \
             WHERE members.organizationId = o.id AND LOWER(o.name) = $1)"
        );
        assert_eq!(sql.params, vec![Value::from("acme")]);
    }

    #[test]
    fn test_exists_always_false_drops_branch() {
        let compiled = compile(json!({
            "$or": [
                {"organizations": {"$elemMatch": {"id": {"$lt": null}}}},
                {"id": 1}
            ]
        }))
        .unwrap();
        assert_eq!(compiled.to_sql(Mysql).unwrap().sql, "id = ?");
    }

    #[test]
    fn test_not_exists() {
        let compiled = compile(json!({"organizations": {"$not": {"$elemMatch": {"id": 3}}}})).unwrap();
        let sql = compiled
            .to_sql_with(Mysql, &RenderOptions::new().default_namespace("members"))
            .unwrap();
        assert!(sql.sql.starts_with("NOT EXISTS (SELECT 1 FROM organizations o"));
    }

    #[test]
    fn test_wildcard_key_is_bound() {
        let (text, params) = sql(json!({"settings.records.a.name": "Rex"}));
        assert_eq!(
            text,
            "LOWER(JSON_UNQUOTE(JSON_EXTRACT(JSON_EXTRACT(JSON_EXTRACT(settings, '$.records'), ?), '$.name'))) <=> ?"
        );
        assert_eq!(params, vec![Value::from("$.a"), Value::from("rex")]);
    }

    #[test]
    fn test_wildcard_hostile_key_stays_a_parameter() {
        let (text, params) = sql(json!({"settings": {"records": {"x') OR 1=1 --": {"name": "a"}}}}));
        assert!(!text.contains("OR 1=1"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_wildcard_column_has_no_children() {
        let registry = FilterRegistry::new().wildcard_column("flags", |key| {
            ColumnDescriptor::new(
                Expr::column("flags").json_extract(JsonPath::for_key(key)),
                SemanticType::JSONString,
            )
        });
        let sql = compiler()
            .compile_json(&json!({"flags.beta": "On"}), &registry)
            .unwrap()
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(sql.sql, "LOWER(JSON_UNQUOTE(JSON_EXTRACT(flags, ?))) = ?");
        assert_eq!(sql.params, vec![Value::from("$.beta"), Value::from("on")]);

        let err = compiler()
            .compile_json(&json!({"flags.beta.level": 2}), &registry)
            .unwrap_err();
        assert!(matches!(err.kind, FilterErrorKind::UnknownField(_)));
    }

    #[test]
    fn test_dot_syntax_equals_nesting() {
        let dotted = compile(json!({"settings.dog.name": "rex"})).unwrap();
        let nested = compile(json!({"settings": {"dog": {"name": "rex"}}})).unwrap();
        assert_eq!(dotted, nested);
    }

    #[test]
    fn test_not_inverts_operator() {
        let (text, _) = sql(json!({"id": {"$not": {"$lt": 5}}}));
        assert_eq!(text, "id >= ?");
    }

    #[test]
    fn test_joined_relation_joins_once() {
        let compiled = compile(json!({
            "$or": [{"group": {"name": "a"}}, {"group": {"name": "b"}}]
        }))
        .unwrap();
        let sql = Select::new()
            .from("members")
            .where_compiled(compiled)
            .to_sql(Mysql)
            .unwrap();
        assert_eq!(sql.sql.matches("LEFT JOIN groups").count(), 1);
        assert_eq!(
            sql.sql,
            "SELECT * FROM members LEFT JOIN groups ON groups.id = members.groupId \
             WHERE LOWER(groups.name) = ? OR LOWER(groups.name) = ?"
        );
    }

    #[test]
    fn test_joined_always_true_keeps_join() {
        let compiled = compile(json!({"group": {"$elemMatch": {}}})).unwrap();
        assert!(matches!(
            &compiled,
            Compiled::Expression(Condition::Joined { inner: None, .. })
        ));
        let sql = Select::new().from("members").where_compiled(compiled).to_sql(Mysql).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT * FROM members LEFT JOIN groups ON groups.id = members.groupId"
        );
    }

    #[test]
    fn test_unknown_field_reports_path() {
        let err = compile(json!({"settings": {"cat": 1}})).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::UnknownField("cat".into()));
        assert_eq!(err.path.to_string(), "settings.cat");
        assert_eq!(
            err.to_string(),
            "invalid filter at `settings.cat`: unknown field `cat`"
        );
    }

    #[test]
    fn test_type_mismatch_reports_path() {
        let err = compile(json!({"id": "seven"})).unwrap_err();
        assert_eq!(
            err.kind,
            FilterErrorKind::TypeMismatch {
                value: "string",
                column: SemanticType::Number
            }
        );
        assert_eq!(err.path.to_string(), "id");
    }

    #[test]
    fn test_short_circuit_skips_remaining_siblings() {
        let compiled = compile(json!({"$and": [{"age": {"$lt": null}}, {"bogus": 1}]})).unwrap();
        assert_eq!(compiled, Compiled::AlwaysFalse);

        let compiled = compile(json!({"$or": [{"age": {"$gte": null}}, {"bogus": 1}]})).unwrap();
        assert_eq!(compiled, Compiled::AlwaysTrue);
    }

    #[test]
    fn test_empty_composites() {
        assert_eq!(compile(json!({"$and": []})).unwrap(), Compiled::AlwaysTrue);
        assert_eq!(compile(json!({"$or": []})).unwrap(), Compiled::AlwaysFalse);
        assert_eq!(compile(json!({"$not": {"$or": []}})).unwrap(), Compiled::AlwaysTrue);
    }

    #[test]
    fn test_now_is_pinned() {
        let (text, params) = sql(json!({"createdAt": {"$lt": {"$": "$now"}}}));
        assert_eq!(text, "createdAt < ?");
        assert_eq!(params, vec![Value::Datetime(DateTime::UNIX_EPOCH)]);
    }

    #[test]
    fn test_deterministic_output() {
        let filter = json!({
            "$or": [{"name": {"$contains": "an"}}, {"tags": {"$in": ["a", 1]}}],
            "settings.dog.name": "rex",
            "age": {"$gt": 3}
        });
        assert_eq!(sql(filter.clone()), sql(filter));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // EDGE CASE TESTS
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_operator_at_root_is_rejected() {
        let err = compile(json!({"$eq": 1})).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::OperatorNotAllowed("$eq".into()));
        assert!(err.path.is_root());
    }

    #[test]
    fn test_elem_match_on_column_is_rejected() {
        let err = compile(json!({"name": {"$elemMatch": {"a": 1}}})).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::UnexpectedElemMatch);
    }

    #[test]
    fn test_marker_is_rejected() {
        let filter = filter::field("id", Filter::Marker);
        let err = compiler().compile(&filter, &registry()).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::UnresolvedMarker);
        assert_eq!(err.path.to_string(), "id");
    }

    #[test]
    fn test_custom_compiler() {
        let registry = FilterRegistry::new().custom("search", |filter, path| match filter {
            Filter::Contains(needle) => Ok(Compiled::Expression(Condition::Like {
                expr: Expr::column("searchIndex"),
                pattern: Value::String(format!("%{needle}%")),
                negated: false,
            })),
            _ => Err(FilterError::new(
                FilterErrorKind::InvalidShape {
                    operator: "search".into(),
                    expected: "$contains",
                },
                path.clone(),
            )),
        });
        let compiled = compiler()
            .compile(&filter::field("search", filter::contains("x")), &registry)
            .unwrap();
        assert_eq!(compiled.to_sql(Mysql).unwrap().sql, "searchIndex LIKE ?");

        let err = compiler()
            .compile(&filter::field("search", filter::eq(1)), &registry)
            .unwrap_err();
        assert_eq!(err.path.to_string(), "search");
    }

    #[test]
    fn test_compile_depth_limit() {
        let mut filter = filter::field("id", filter::eq(1));
        for _ in 0..40 {
            filter = filter::not(filter);
        }
        let err = compiler().compile(&filter, &registry()).unwrap_err();
        assert_eq!(err.kind, FilterErrorKind::TooDeep { max: 32 });
    }

    #[test]
    fn test_json_array_in_uses_overlap() {
        let (text, params) = sql(json!({"tags": {"$in": ["A", 2, null]}}));
        assert_eq!(text, "JSON_CONTAINS(tags, ?) OR tags IS NULL OR JSON_OVERLAPS(tags, ?)");
        assert_eq!(
            params,
            vec![Value::from("null"), Value::from(r#"["a",2]"#)]
        );
    }

    #[test]
    fn test_compiled_algebra() {
        let c = Compiled::Expression(Condition::is_null(Expr::column("a")));
        assert_eq!(Compiled::AlwaysTrue.and(c.clone()), c);
        assert_eq!(Compiled::AlwaysFalse.or(c.clone()), c);
        assert_eq!(c.clone().and(Compiled::AlwaysFalse), Compiled::AlwaysFalse);
        assert_eq!(c.clone().or(Compiled::AlwaysTrue), Compiled::AlwaysTrue);
        assert_eq!(Compiled::from(true).negate(), Compiled::AlwaysFalse);
        assert_eq!(
            Compiled::AlwaysFalse.into_condition().to_sql(Mysql).unwrap().sql,
            "FALSE"
        );
    }
}
