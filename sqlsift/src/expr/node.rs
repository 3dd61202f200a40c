//! Value expressions: columns, parameters, functions and subqueries.

use crate::dialect::Dialect;
use crate::error::RenderError;
use crate::query::Select;
use crate::validate::{assert_valid_json_path, assert_valid_sql_identifier, is_valid_sql_identifier};

use super::{RenderOptions, Renderer, ToSql, Value};

/// Which table a column is qualified with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    /// The table of the statement the column is rendered in.
    Default,
    /// The table of the enclosing statement (correlated subqueries, join conditions).
    Parent,
    /// An explicit table or alias.
    Named(String),
}

/// A column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Qualification.
    pub namespace: Namespace,
    /// Column name.
    pub name: String,
}

impl Column {
    /// Column of the current table.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid SQL identifier.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert_valid_sql_identifier(&name, "column");
        Self {
            namespace: Namespace::Default,
            name,
        }
    }

    /// Column of the enclosing statement's table.
    #[track_caller]
    pub fn parent(name: impl Into<String>) -> Self {
        Self {
            namespace: Namespace::Parent,
            ..Self::new(name)
        }
    }

    /// Column of an explicitly named table or alias.
    #[track_caller]
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        let table = table.into();
        assert_valid_sql_identifier(&table, "table");
        Self {
            namespace: Namespace::Named(table),
            ..Self::new(name)
        }
    }
}

impl ToSql for Column {
    fn render<D: Dialect>(
        &self,
        _renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let namespace = match &self.namespace {
            Namespace::Default => options.default_namespace.as_deref(),
            Namespace::Parent => Some(
                options
                    .parent_namespace
                    .as_deref()
                    .ok_or_else(|| RenderError::MissingNamespace(self.name.clone()))?,
            ),
            Namespace::Named(name) => Some(name.as_str()),
        };
        Ok(match namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        })
    }
}

/// A table reference with optional alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Alias used to qualify columns.
    pub alias: Option<String>,
}

impl Table {
    /// Table without alias.
    #[track_caller]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        assert_valid_sql_identifier(&name, "table");
        Self { name, alias: None }
    }

    /// Table with alias.
    #[track_caller]
    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        assert_valid_sql_identifier(&alias, "alias");
        Self {
            alias: Some(alias),
            ..Self::new(name)
        }
    }

    /// Name that columns of this table are qualified with.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub(crate) fn sql(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} {alias}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A JSON path argument of a JSON extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPath {
    /// Trusted literal path, rendered inline as a quoted string.
    Fixed(String),
    /// Path derived from caller data, always bound as a parameter.
    Bound(String),
}

impl JsonPath {
    /// A trusted literal path such as `$.name`.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid fixed JSON path.
    #[track_caller]
    pub fn fixed(path: impl Into<String>) -> Self {
        let path = path.into();
        assert_valid_json_path(&path);
        Self::Fixed(path)
    }

    /// The bound path selecting the member `key` of an object.
    ///
    /// ```
    /// use sqlsift::JsonPath;
    ///
    /// assert_eq!(JsonPath::for_key("a").as_str(), "$.a");
    /// assert_eq!(JsonPath::for_key("first name").as_str(), "$.\"first name\"");
    /// assert_eq!(JsonPath::for_key("x\"y").as_str(), "$.\"x\\\"y\"");
    /// ```
    #[must_use]
    pub fn for_key(key: &str) -> Self {
        if is_valid_sql_identifier(key) {
            return Self::Bound(format!("$.{key}"));
        }
        let mut escaped = String::with_capacity(key.len() + 2);
        for c in key.chars() {
            if c == '"' || c == '\\' {
                escaped.push('\\');
            }
            escaped.push(c);
        }
        Self::Bound(format!("$.\"{escaped}\""))
    }

    /// The path text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Fixed(p) | Self::Bound(p) => p,
        }
    }

    fn render<D: Dialect>(&self, renderer: &mut Renderer<D>) -> String {
        match self {
            Self::Fixed(path) => format!("'{path}'"),
            Self::Bound(path) => renderer.push(Value::String(path.clone())),
        }
    }
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference.
    Column(Column),
    /// Bound parameter.
    Param(Value),
    /// The `NULL` literal.
    Null,
    /// Trusted SQL token such as `1`, `*` or `NOW()`.
    Keyword(&'static str),
    /// `LOWER(expr)`.
    Lower(Box<Self>),
    /// `CAST(expr AS ty)`.
    Cast {
        /// Expression to convert.
        expr: Box<Self>,
        /// Trusted target type.
        ty: &'static str,
    },
    /// Extract the JSON document at `path`.
    JsonExtract {
        /// JSON document.
        target: Box<Self>,
        /// Path into the document.
        path: JsonPath,
    },
    /// Convert an extracted JSON scalar to SQL text.
    JsonUnquote(Box<Self>),
    /// The JSON string at a fixed path of a column, `NULL` for other JSON types.
    JsonString {
        /// JSON column.
        column: Column,
        /// Fixed path, validated on construction.
        path: String,
    },
    /// `COUNT(*)` or `COUNT(expr)`.
    Count(Option<Box<Self>>),
    /// `SUM(expr)`.
    Sum(Box<Self>),
    /// `COALESCE(a, b, ...)`.
    Coalesce(Vec<Self>),
    /// Scalar subquery.
    Subquery(Box<Select>),
    /// `EXISTS (subquery)` as a value.
    Exists(Box<Select>),
}

impl Expr {
    /// Column of the current table.
    #[track_caller]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(Column::new(name))
    }

    /// Column of the enclosing statement's table.
    #[track_caller]
    pub fn parent_column(name: impl Into<String>) -> Self {
        Self::Column(Column::parent(name))
    }

    /// Column of an explicitly named table.
    #[track_caller]
    pub fn qualified(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Column(Column::qualified(table, name))
    }

    /// Bound parameter.
    pub fn param(value: impl Into<Value>) -> Self {
        Self::Param(value.into())
    }

    /// `LOWER(self)`.
    #[must_use]
    pub fn lower(self) -> Self {
        Self::Lower(Box::new(self))
    }

    /// `CAST(self AS ty)`.
    #[must_use]
    pub fn cast(self, ty: &'static str) -> Self {
        Self::Cast {
            expr: Box::new(self),
            ty,
        }
    }

    /// Extract `path` from this JSON document.
    #[must_use]
    pub fn json_extract(self, path: JsonPath) -> Self {
        Self::JsonExtract {
            target: Box::new(self),
            path,
        }
    }

    /// Unquote this extracted JSON scalar.
    #[must_use]
    pub fn json_unquote(self) -> Self {
        Self::JsonUnquote(Box::new(self))
    }

    /// The JSON string at `path` of `column`.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid fixed JSON path.
    #[track_caller]
    pub fn json_string(column: Column, path: impl Into<String>) -> Self {
        let path = path.into();
        assert_valid_json_path(&path);
        Self::JsonString { column, path }
    }

    /// `COALESCE(self, fallback)`.
    #[must_use]
    pub fn coalesce(self, fallback: Self) -> Self {
        Self::Coalesce(vec![self, fallback])
    }
}

impl From<Column> for Expr {
    fn from(column: Column) -> Self {
        Self::Column(column)
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Param(value)
    }
}

impl ToSql for Expr {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        Ok(match self {
            Self::Column(column) => column.render(renderer, options)?,
            Self::Param(value) => renderer.push(value.clone()),
            Self::Null => "NULL".to_string(),
            Self::Keyword(keyword) => (*keyword).to_string(),
            Self::Lower(expr) => format!("LOWER({})", expr.render(renderer, options)?),
            Self::Cast { expr, ty } => format!("CAST({} AS {ty})", expr.render(renderer, options)?),
            Self::JsonExtract { target, path } => {
                let target = target.render(renderer, options)?;
                let path = path.render(renderer);
                renderer.dialect().json_extract(&target, &path)
            },
            Self::JsonUnquote(expr) => {
                let inner = expr.render(renderer, options)?;
                renderer.dialect().json_unquote(&inner)
            },
            Self::JsonString { column, path } => {
                let column = column.render(renderer, options)?;
                renderer.dialect().json_string(&column, &format!("'{path}'"))
            },
            Self::Count(None) => "COUNT(*)".to_string(),
            Self::Count(Some(expr)) => format!("COUNT({})", expr.render(renderer, options)?),
            Self::Sum(expr) => format!("SUM({})", expr.render(renderer, options)?),
            Self::Coalesce(exprs) => {
                let parts = exprs
                    .iter()
                    .map(|e| e.render(renderer, options))
                    .collect::<Result<Vec<_>, _>>()?;
                format!("COALESCE({})", parts.join(", "))
            },
            Self::Subquery(select) => format!("({})", select.render(renderer, options)?),
            Self::Exists(select) => format!("EXISTS ({})", select.render(renderer, options)?),
        })
    }
}
