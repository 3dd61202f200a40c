//! Sort registries and keyset pagination.
//!
//! A sort specification is resolved against a [`SortRegistry`], which always
//! appends the registry's unique tie-break key. The same resolved
//! specification yields the `ORDER BY` clause, the in-memory comparator and
//! the cursor of a row, so the three can never disagree.
//!
//! # Example
//!
//! ```
//! use sqlsift::{Mysql, Select, SortDefinition, SortField, SortRegistry, ToSql};
//!
//! struct Member {
//!     id: i64,
//!     name: String,
//! }
//!
//! let sorts = SortRegistry::<Member>::builder("id")
//!     .key("id", SortDefinition::column("id", |m: &Member| m.id.into()))
//!     .key("name", SortDefinition::text("name", |m: &Member| m.name.as_str().into()))
//!     .build()
//!     .unwrap();
//!
//! let sort = SortField::parse_sort_string("-name").unwrap();
//! let select = sorts.apply(Select::new().from("members"), &sort).unwrap();
//!
//! assert_eq!(
//!     select.to_sql(Mysql).unwrap().sql,
//!     "SELECT * FROM members ORDER BY LOWER(members.name) DESC, members.id ASC"
//! );
//! ```

mod cursor;
mod keyset;
mod page;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, SortError};
use crate::expr::{Expr, Join};
use crate::filter::CompareValue;
use crate::query::{OrderBy, Select};

pub use cursor::Cursor;
pub use keyset::KeysetCondition;
pub use page::{PageInfo, PageRequest};

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDir {
    /// Ascending, NULL first.
    #[default]
    Asc,
    /// Descending, NULL last.
    Desc,
}

impl SortDir {
    /// `ASC` or `DESC`.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// One `(key, direction)` pair of a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Public sort key.
    pub key: String,
    /// Direction.
    pub dir: SortDir,
}

impl SortField {
    /// Create a sort field.
    pub fn new(key: impl Into<String>, dir: SortDir) -> Self {
        Self {
            key: key.into(),
            dir,
        }
    }

    /// Ascending sort on `key`.
    pub fn asc(key: impl Into<String>) -> Self {
        Self::new(key, SortDir::Asc)
    }

    /// Descending sort on `key`.
    pub fn desc(key: impl Into<String>) -> Self {
        Self::new(key, SortDir::Desc)
    }

    /// Parse a sort string like `"name,-createdAt"`.
    ///
    /// Keys prefixed with `-` sort descending. Keys are not checked here;
    /// [`SortRegistry::assert_sort`] rejects unknown ones.
    ///
    /// ```
    /// use sqlsift::{SortDir, SortField};
    ///
    /// let sort = SortField::parse_sort_string("name, -createdAt").unwrap();
    /// assert_eq!(sort, vec![SortField::asc("name"), SortField::desc("createdAt")]);
    /// ```
    pub fn parse_sort_string(sort: &str) -> Result<Vec<Self>, SortError> {
        let mut result = Vec::new();
        for part in sort.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let field = match part.strip_prefix('-') {
                Some(key) => Self::desc(key.trim()),
                None => Self::asc(part),
            };
            if field.key.is_empty() {
                return Err(SortError::UnknownSortKey(part.to_string()));
            }
            result.push(field);
        }
        if result.is_empty() {
            return Err(SortError::EmptySort);
        }
        Ok(result)
    }
}

/// Reads the sort value of a row.
pub type GetValue<T> = Arc<dyn Fn(&T) -> CompareValue + Send + Sync>;

/// Produces the `ORDER BY` term of a key for a direction.
pub type OrderByFor = Arc<dyn Fn(SortDir) -> OrderBy + Send + Sync>;

/// How one sort key orders rows, in SQL and in memory.
///
/// `get_value` must return what the database compares: a key ordered by
/// `LOWER(col)` returns the lowercased value.
pub struct SortDefinition<T> {
    get_value: GetValue<T>,
    to_sql: OrderByFor,
    join: Option<Join>,
    nullable: bool,
}

impl<T> SortDefinition<T> {
    /// A definition from its two halves.
    pub fn new<G, S>(get_value: G, to_sql: S) -> Self
    where
        G: Fn(&T) -> CompareValue + Send + Sync + 'static,
        S: Fn(SortDir) -> OrderBy + Send + Sync + 'static,
    {
        Self {
            get_value: Arc::new(get_value),
            to_sql: Arc::new(to_sql),
            join: None,
            nullable: true,
        }
    }

    /// Sort by a column of the selected table.
    #[track_caller]
    pub fn column<G>(name: &str, get_value: G) -> Self
    where
        G: Fn(&T) -> CompareValue + Send + Sync + 'static,
    {
        Self::expr(Expr::column(name), get_value)
    }

    /// Sort by an arbitrary expression.
    pub fn expr<G>(expr: Expr, get_value: G) -> Self
    where
        G: Fn(&T) -> CompareValue + Send + Sync + 'static,
    {
        Self::new(get_value, move |dir| OrderBy::new(expr.clone(), dir))
    }

    /// Sort case-insensitively by a text column.
    ///
    /// Orders by `LOWER(col)`, matching how string filters compare, and
    /// lowercases the row value.
    #[track_caller]
    pub fn text<G>(name: &str, get_value: G) -> Self
    where
        G: Fn(&T) -> CompareValue + Send + Sync + 'static,
    {
        let expr = Expr::column(name).lower();
        Self::new(
            move |row| match get_value(row) {
                CompareValue::String(s) => CompareValue::String(s.to_lowercase()),
                other => other,
            },
            move |dir| OrderBy::new(expr.clone(), dir),
        )
    }

    /// Require `join` whenever this key is sorted on.
    #[must_use]
    pub fn with_join(mut self, join: Join) -> Self {
        self.join = Some(join);
        self
    }

    /// Declare that the sort expression never yields NULL.
    ///
    /// Keyset predicates then leave out the `IS NULL` branch.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Whether the sort expression may yield NULL.
    pub const fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Sort value of `row`.
    pub fn value(&self, row: &T) -> CompareValue {
        (self.get_value)(row)
    }

    /// `ORDER BY` term for `dir`.
    pub fn order_by(&self, dir: SortDir) -> OrderBy {
        (self.to_sql)(dir)
    }
}

impl<T> Clone for SortDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            get_value: Arc::clone(&self.get_value),
            to_sql: Arc::clone(&self.to_sql),
            join: self.join.clone(),
            nullable: self.nullable,
        }
    }
}

impl<T> fmt::Debug for SortDefinition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortDefinition")
            .field("order_by", &self.order_by(SortDir::Asc))
            .field("join", &self.join)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SortRegistry`].
#[derive(Debug)]
#[must_use = "call .build() to finish the registry"]
pub struct SortRegistryBuilder<T> {
    tie_break: String,
    keys: BTreeMap<String, SortDefinition<T>>,
}

impl<T> SortRegistryBuilder<T> {
    /// Register a sort key.
    ///
    /// # Panics
    ///
    /// Panics if `name` is already registered.
    #[track_caller]
    pub fn key(mut self, name: impl Into<String>, definition: SortDefinition<T>) -> Self {
        let name = name.into();
        assert!(
            !self.keys.contains_key(&name),
            "Sort key '{name}' is registered twice"
        );
        self.keys.insert(name, definition);
        self
    }

    /// Finish the registry.
    ///
    /// Fails when the tie-break key was never registered: without it
    /// pagination over duplicate sort values is not well defined.
    pub fn build(self) -> Result<SortRegistry<T>, RegistryError> {
        if !self.keys.contains_key(&self.tie_break) {
            return Err(RegistryError::MissingTieBreak(self.tie_break));
        }
        Ok(SortRegistry {
            tie_break: self.tie_break,
            keys: self.keys,
        })
    }
}

/// Immutable map from sort key to [`SortDefinition`], with a tie-break key.
pub struct SortRegistry<T> {
    tie_break: String,
    keys: BTreeMap<String, SortDefinition<T>>,
}

impl<T> Clone for SortRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            tie_break: self.tie_break.clone(),
            keys: self.keys.clone(),
        }
    }
}

impl<T> fmt::Debug for SortRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortRegistry")
            .field("tie_break", &self.tie_break)
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> SortRegistry<T> {
    /// Start a registry whose unique tie-break key is `tie_break`.
    pub fn builder(tie_break: impl Into<String>) -> SortRegistryBuilder<T> {
        SortRegistryBuilder {
            tie_break: tie_break.into(),
            keys: BTreeMap::new(),
        }
    }

    /// The tie-break key.
    #[must_use]
    pub fn tie_break(&self) -> &str {
        &self.tie_break
    }

    /// Look up a key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SortDefinition<T>> {
        self.keys.get(key)
    }

    /// Validate `sort` and append the tie-break key if it is absent.
    ///
    /// Repeated keys keep their first occurrence. An empty specification
    /// sorts by the tie-break key ascending.
    pub fn assert_sort(&self, sort: &[SortField]) -> Result<Vec<SortField>, SortError> {
        let mut resolved: Vec<SortField> = Vec::with_capacity(sort.len() + 1);
        for field in sort {
            if !self.keys.contains_key(&field.key) {
                return Err(SortError::UnknownSortKey(field.key.clone()));
            }
            if !resolved.iter().any(|f| f.key == field.key) {
                resolved.push(field.clone());
            }
        }
        if !resolved.iter().any(|f| f.key == self.tie_break) {
            resolved.push(SortField::asc(self.tie_break.clone()));
        }
        Ok(resolved)
    }

    fn resolve(&self, sort: &[SortField]) -> Result<Vec<(&str, &SortDefinition<T>, SortDir)>, SortError> {
        self.assert_sort(sort)?
            .into_iter()
            .map(|field| {
                self.keys
                    .get_key_value(&field.key)
                    .map(|(key, definition)| (key.as_str(), definition, field.dir))
                    .ok_or(SortError::UnknownSortKey(field.key))
            })
            .collect()
    }

    /// `ORDER BY` terms and the joins they require, deduplicated.
    pub fn order_by(&self, sort: &[SortField]) -> Result<(Vec<OrderBy>, Vec<Join>), SortError> {
        let mut terms = Vec::new();
        let mut joins: Vec<Join> = Vec::new();
        for (_, definition, dir) in self.resolve(sort)? {
            terms.push(definition.order_by(dir));
            if let Some(join) = &definition.join
                && !joins.contains(join)
            {
                joins.push(join.clone());
            }
        }
        Ok((terms, joins))
    }

    /// Add the `ORDER BY` of `sort` to `select`.
    pub fn apply(&self, select: Select, sort: &[SortField]) -> Result<Select, SortError> {
        let (terms, joins) = self.order_by(sort)?;
        let select = joins.into_iter().fold(select, Select::join);
        Ok(terms.into_iter().fold(select, Select::order_by))
    }

    /// In-memory comparator equivalent to the `ORDER BY` of `sort`.
    pub fn comparator(&self, sort: &[SortField]) -> Result<impl Fn(&T, &T) -> Ordering + '_, SortError> {
        let keys = self.resolve(sort)?;
        Ok(move |a: &T, b: &T| {
            for (_, definition, dir) in &keys {
                let ordering = definition.value(a).sort_cmp(&definition.value(b));
                let ordering = match dir {
                    SortDir::Asc => ordering,
                    SortDir::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        })
    }

    /// The sort-key tuple of `row`.
    pub fn values(&self, row: &T, sort: &[SortField]) -> Result<Vec<(String, CompareValue)>, SortError> {
        Ok(self
            .resolve(sort)?
            .into_iter()
            .map(|(key, definition, _)| (key.to_string(), definition.value(row)))
            .collect())
    }
}
