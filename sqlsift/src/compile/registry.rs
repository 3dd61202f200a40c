//! Filter-definition registries.
//!
//! A registry maps the public field names of one entity to the way each
//! field is compiled. Registries are built once at startup and shared
//! read-only between requests.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::{ColumnDescriptor, Compiled};
use crate::error::{FieldPath, FilterError};
use crate::expr::Join;
use crate::filter::Filter;
use crate::query::Select;

/// Descriptor factory of a wildcard field, called with the dynamic key.
pub type ColumnForKey = Arc<dyn Fn(&str) -> ColumnDescriptor + Send + Sync>;

/// Sub-registry factory of a wildcard field, called with the dynamic key.
pub type ChildrenForKey = Arc<dyn Fn(&str) -> FilterRegistry + Send + Sync>;

/// Hand-written compiler for a field. Receives the filter below the field
/// and the field's path for error reporting.
pub type CustomCompiler = Arc<dyn Fn(&Filter, &FieldPath) -> Result<Compiled, FilterError> + Send + Sync>;

/// How one registered field compiles.
#[derive(Clone)]
#[non_exhaustive]
pub enum FilterDefinition {
    /// A column, optionally with sub-fields (e.g. members of a JSON column).
    Column {
        /// Target column.
        column: ColumnDescriptor,
        /// Fields below the column.
        children: Option<FilterRegistry>,
    },
    /// A sub-object on the same row.
    Nested(FilterRegistry),
    /// A one-to-many relation compiled to a correlated `EXISTS`.
    Exists {
        /// Correlated subquery selecting related rows of the parent row.
        base: Select,
        /// Fields of the related entity.
        registry: FilterRegistry,
    },
    /// A one-to-one relation compiled through a join hoisted into the
    /// enclosing SELECT.
    Joined {
        /// Join to the related table.
        join: Join,
        /// Fields of the related entity.
        registry: FilterRegistry,
        /// The related row exists for every parent row.
        relation_always_exists: bool,
    },
    /// A JSON map whose keys are only known at compile time.
    Wildcard {
        /// Column for the value under a key.
        column_for_key: ColumnForKey,
        /// Fields below the value under a key.
        children_for_key: Option<ChildrenForKey>,
    },
    /// A hand-written compiler.
    Custom(CustomCompiler),
}

impl fmt::Debug for FilterDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column { column, children } => f
                .debug_struct("Column")
                .field("column", column)
                .field("children", children)
                .finish(),
            Self::Nested(registry) => f.debug_tuple("Nested").field(registry).finish(),
            Self::Exists { base, registry } => f
                .debug_struct("Exists")
                .field("base", base)
                .field("registry", registry)
                .finish(),
            Self::Joined {
                join,
                registry,
                relation_always_exists,
            } => f
                .debug_struct("Joined")
                .field("join", join)
                .field("registry", registry)
                .field("relation_always_exists", relation_always_exists)
                .finish(),
            Self::Wildcard {
                children_for_key, ..
            } => f
                .debug_struct("Wildcard")
                .field("has_children", &children_for_key.is_some())
                .finish_non_exhaustive(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Immutable map from field name to [`FilterDefinition`].
///
/// ```
/// use sqlsift::{ColumnDescriptor, FilterRegistry, SemanticType};
///
/// let registry = FilterRegistry::new()
///     .column("id", ColumnDescriptor::column("id", SemanticType::Number))
///     .column("firstName", ColumnDescriptor::column("firstName", SemanticType::String));
///
/// assert!(registry.get("firstName").is_some());
/// assert!(registry.get("password").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    fields: BTreeMap<String, FilterDefinition>,
}

impl FilterRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` with an arbitrary definition.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or already registered.
    #[track_caller]
    pub fn define(mut self, name: impl Into<String>, definition: FilterDefinition) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "Invalid filter field name: empty");
        assert!(
            !self.fields.contains_key(&name),
            "Filter field '{name}' is registered twice"
        );
        self.fields.insert(name, definition);
        self
    }

    /// Register a column.
    #[track_caller]
    pub fn column(self, name: impl Into<String>, column: ColumnDescriptor) -> Self {
        self.define(
            name,
            FilterDefinition::Column {
                column,
                children: None,
            },
        )
    }

    /// Register a column whose sub-fields are filterable too.
    #[track_caller]
    pub fn column_with_children(
        self,
        name: impl Into<String>,
        column: ColumnDescriptor,
        children: Self,
    ) -> Self {
        self.define(
            name,
            FilterDefinition::Column {
                column,
                children: Some(children),
            },
        )
    }

    /// Register a sub-object on the same row.
    #[track_caller]
    pub fn nested(self, name: impl Into<String>, registry: Self) -> Self {
        self.define(name, FilterDefinition::Nested(registry))
    }

    /// Register a one-to-many relation compiled to `EXISTS (base AND filter)`.
    ///
    /// `base` must correlate to the parent row through parent columns, e.g.
    /// `Column::parent("id")`.
    #[track_caller]
    pub fn exists(self, name: impl Into<String>, base: Select, registry: Self) -> Self {
        self.define(name, FilterDefinition::Exists { base, registry })
    }

    /// Register a one-to-one relation compiled through `join`.
    #[track_caller]
    pub fn joined(
        self,
        name: impl Into<String>,
        join: Join,
        registry: Self,
        relation_always_exists: bool,
    ) -> Self {
        self.define(
            name,
            FilterDefinition::Joined {
                join,
                registry,
                relation_always_exists,
            },
        )
    }

    /// Register a JSON map with dynamic keys whose values have sub-fields.
    ///
    /// The key reaches the SQL only through the descriptors the factories
    /// return; build them with [`JsonPath::for_key`](crate::JsonPath::for_key)
    /// so the key is bound as a parameter.
    #[track_caller]
    pub fn wildcard<C, K>(self, name: impl Into<String>, column_for_key: C, children_for_key: K) -> Self
    where
        C: Fn(&str) -> ColumnDescriptor + Send + Sync + 'static,
        K: Fn(&str) -> Self + Send + Sync + 'static,
    {
        self.define(
            name,
            FilterDefinition::Wildcard {
                column_for_key: Arc::new(column_for_key),
                children_for_key: Some(Arc::new(children_for_key) as ChildrenForKey),
            },
        )
    }

    /// Register a JSON map with dynamic keys and scalar values.
    #[track_caller]
    pub fn wildcard_column<C>(self, name: impl Into<String>, column_for_key: C) -> Self
    where
        C: Fn(&str) -> ColumnDescriptor + Send + Sync + 'static,
    {
        self.define(
            name,
            FilterDefinition::Wildcard {
                column_for_key: Arc::new(column_for_key),
                children_for_key: None,
            },
        )
    }

    /// Register a hand-written compiler.
    #[track_caller]
    pub fn custom<F>(self, name: impl Into<String>, compiler: F) -> Self
    where
        F: Fn(&Filter, &FieldPath) -> Result<Compiled, FilterError> + Send + Sync + 'static,
    {
        self.define(name, FilterDefinition::Custom(Arc::new(compiler)))
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FilterDefinition> {
        self.fields.get(name)
    }

    /// Registered field names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of registered fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if no field is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
