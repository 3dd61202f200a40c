//! Rendering machinery shared by every expression node.

use crate::dialect::Dialect;
use crate::error::RenderError;

use super::Value;

/// Namespaces used to qualify columns while rendering.
///
/// A SELECT rendered inside another statement uses its own table as the
/// default namespace and the enclosing default namespace as its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Table or alias that unqualified columns belong to.
    pub default_namespace: Option<String>,
    /// Table or alias of the enclosing query.
    pub parent_namespace: Option<String>,
}

impl RenderOptions {
    /// Options with no namespaces: columns render unqualified.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_namespace: None,
            parent_namespace: None,
        }
    }

    /// Set the default namespace.
    #[must_use]
    pub fn default_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.default_namespace = Some(namespace.into());
        self
    }

    /// Set the parent namespace.
    #[must_use]
    pub fn parent_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.parent_namespace = Some(namespace.into());
        self
    }

    /// Options for a statement nested inside this one whose own namespace is `inner`.
    #[must_use]
    pub(crate) fn nested(&self, inner: Option<String>) -> Self {
        Self {
            default_namespace: inner,
            parent_namespace: self.default_namespace.clone(),
        }
    }
}

/// Accumulates bound parameters while a statement is rendered.
///
/// Placeholders are assigned strictly in emission order, so the SQL text and
/// the parameter list can never disagree.
#[derive(Debug)]
pub struct Renderer<D: Dialect> {
    dialect: D,
    params: Vec<Value>,
}

impl<D: Dialect> Renderer<D> {
    /// Create a renderer for `dialect`.
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    /// The dialect being rendered.
    pub fn dialect(&self) -> D {
        self.dialect
    }

    /// Bind a value and return its placeholder.
    pub fn push(&mut self, value: Value) -> String {
        self.params.push(value);
        self.dialect.param(self.params.len())
    }

    /// 1-based index of the next parameter.
    pub(crate) fn next_index(&self) -> usize {
        self.params.len() + 1
    }

    /// Append parameters already referenced by dialect-generated text.
    pub(crate) fn extend(&mut self, values: Vec<Value>) {
        self.params.extend(values);
    }

    /// Finish rendering and take the parameters.
    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// A rendered statement: SQL text plus positional parameters.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "SQL must be executed or inspected"]
pub struct Sql {
    /// The SQL text with placeholders.
    pub sql: String,
    /// Parameters in placeholder order.
    pub params: Vec<Value>,
}

impl Sql {
    /// Create from text and parameters.
    pub const fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }

    /// The empty query, produced for statically decided filters.
    pub const fn empty() -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Returns `true` when there is no SQL text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// The plan request for this statement, with the same parameters.
    pub fn explain<D: Dialect>(&self, dialect: D) -> Self {
        Self::new(
            format!("{}{}", dialect.explain_prefix(), self.sql),
            self.params.clone(),
        )
    }
}

/// Anything that renders to SQL text plus parameters.
pub trait ToSql {
    /// Render into `renderer`, returning the SQL text of this node.
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError>;

    /// Render with no namespaces.
    fn to_sql<D: Dialect>(&self, dialect: D) -> Result<Sql, RenderError> {
        self.to_sql_with(dialect, &RenderOptions::new())
    }

    /// Render with explicit namespaces.
    fn to_sql_with<D: Dialect>(&self, dialect: D, options: &RenderOptions) -> Result<Sql, RenderError> {
        let mut renderer = Renderer::new(dialect);
        let sql = self.render(&mut renderer, options)?;
        Ok(Sql::new(sql, renderer.into_params()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Mysql, Postgres, Sqlite};

    #[test]
    fn test_placeholders_follow_emission_order() {
        let mut r = Renderer::new(Postgres);
        assert_eq!(r.push(Value::Int(1)), "$1");
        assert_eq!(r.push(Value::Int(2)), "$2");
        assert_eq!(r.next_index(), 3);
        assert_eq!(r.into_params(), vec![Value::Int(1), Value::Int(2)]);

        let mut r = Renderer::new(Sqlite);
        r.push(Value::Null);
        assert_eq!(r.push(Value::Null), "?2");

        let mut r = Renderer::new(Mysql);
        assert_eq!(r.push(Value::Null), "?");
    }

    #[test]
    fn test_nested_options_shadow_namespaces() {
        let outer = RenderOptions::new().default_namespace("members");
        let inner = outer.nested(Some("o".into()));
        assert_eq!(inner.default_namespace.as_deref(), Some("o"));
        assert_eq!(inner.parent_namespace.as_deref(), Some("members"));
    }

    #[test]
    fn test_empty_sql() {
        let sql = Sql::empty();
        assert!(sql.is_empty());
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_explain_keeps_params() {
        let sql = Sql::new("SELECT * FROM members WHERE id = ?1".into(), vec![Value::Int(3)]);
        let plan = sql.explain(Sqlite);
        assert_eq!(plan.sql, "EXPLAIN QUERY PLAN SELECT * FROM members WHERE id = ?1");
        assert_eq!(plan.params, sql.params);
        assert!(sql.explain(Mysql).sql.starts_with("EXPLAIN SELECT"));
    }
}
