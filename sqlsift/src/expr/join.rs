//! Table joins.

use crate::dialect::Dialect;
use crate::error::RenderError;

use super::{Condition, RenderOptions, Renderer, Table, ToSql};

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `LEFT JOIN`
    Left,
    /// `JOIN`
    Inner,
}

/// A join clause.
///
/// The `on` condition is rendered with the joined table as default namespace
/// and the enclosing SELECT's table as parent namespace, so
/// `Column::new("id")` refers to the joined table and `Column::parent(..)`
/// to the table being selected from.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Join type.
    pub kind: JoinKind,
    /// Joined table.
    pub table: Table,
    /// Join condition.
    pub on: Condition,
}

impl Join {
    /// Create a join.
    #[must_use]
    pub const fn new(kind: JoinKind, table: Table, on: Condition) -> Self {
        Self { kind, table, on }
    }

    /// `LEFT JOIN table ON on`
    #[must_use]
    pub const fn left(table: Table, on: Condition) -> Self {
        Self::new(JoinKind::Left, table, on)
    }

    /// `JOIN table ON on`
    #[must_use]
    pub const fn inner(table: Table, on: Condition) -> Self {
        Self::new(JoinKind::Inner, table, on)
    }
}

impl ToSql for Join {
    fn render<D: Dialect>(
        &self,
        renderer: &mut Renderer<D>,
        options: &RenderOptions,
    ) -> Result<String, RenderError> {
        let keyword = match self.kind {
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Inner => "JOIN",
        };
        let on_options = options.nested(Some(self.table.namespace().to_string()));
        let on = self.on.render(renderer, &on_options)?;
        Ok(format!("{keyword} {} ON {on}", self.table.sql()))
    }
}
