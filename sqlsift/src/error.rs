//! Error types.
//!
//! Every caller-input problem surfaces as a [`FilterError`] carrying the
//! dotted path of the offending node. Render and registry errors indicate
//! programmer mistakes and are reported once, at construction or render time.

use std::fmt;

use thiserror::Error;

use crate::compile::SemanticType;

/// Maximum allowed cursor size in bytes (4KB).
pub(crate) const MAX_CURSOR_SIZE: usize = 4 * 1024;

/// Maximum number of fields allowed in a cursor.
pub(crate) const MAX_CURSOR_FIELDS: usize = 16;

/// Dotted path of a node inside a filter tree, e.g. `settings.dog.name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty (root) path.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// Returns `true` for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segments, outermost first.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("$root")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

/// Why a filter was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FilterErrorKind {
    /// The field is not registered for this entity.
    #[error("unknown field `{0}`")]
    UnknownField(String),
    /// A `$`-prefixed key that is not a supported operator.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),
    /// An operator received a value of the wrong shape.
    #[error("operator `{operator}` expects {expected}")]
    InvalidShape {
        /// The offending operator.
        operator: String,
        /// Description of what was expected.
        expected: &'static str,
    },
    /// `$in` received more values than allowed.
    #[error("too many values in $in filter: {actual} (maximum is {max})")]
    TooManyValues {
        /// Configured maximum.
        max: usize,
        /// Number of values received.
        actual: usize,
    },
    /// The value cannot be compared against the column's semantic type.
    #[error("cannot compare a {value} with a {column} column")]
    TypeMismatch {
        /// Kind of value supplied.
        value: &'static str,
        /// Semantic type of the target column.
        column: SemanticType,
    },
    /// A comparison operator used where no column is selected.
    #[error("operator `{0}` is not allowed at root level")]
    OperatorNotAllowed(String),
    /// `$elemMatch` used on something other than a relation.
    #[error("$elemMatch is only allowed on relations")]
    UnexpectedElemMatch,
    /// A template marker was left in a filter handed to the compiler.
    #[error("filter contains an unresolved marker")]
    UnresolvedMarker,
    /// The filter does not supply a required scope.
    #[error("filter does not contain the required scope")]
    MissingScope,
    /// The filter nests deeper than allowed.
    #[error("filter nesting exceeds maximum depth of {max}")]
    TooDeep {
        /// Configured maximum depth.
        max: usize,
    },
    /// The filter text is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// A `{"$": ...}` value with an unknown tag.
    #[error("unsupported magic value `{0}`")]
    UnsupportedMagicValue(String),
}

/// The `invalid_filter` error: a caller-input bug, never transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter at `{path}`: {kind}")]
pub struct FilterError {
    /// What went wrong.
    pub kind: FilterErrorKind,
    /// Where in the filter tree it went wrong.
    pub path: FieldPath,
}

impl FilterError {
    /// Create an error at `path`.
    #[must_use]
    pub const fn new(kind: FilterErrorKind, path: FieldPath) -> Self {
        Self { kind, path }
    }

    /// Create an error at the root of the filter.
    #[must_use]
    pub const fn at_root(kind: FilterErrorKind) -> Self {
        Self::new(kind, FieldPath::root())
    }

    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        "invalid_filter"
    }
}

/// Errors raised while resolving a sort specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SortError {
    /// The sort key is not registered for this entity.
    #[error("unknown sort key `{0}`")]
    UnknownSortKey(String),
    /// A sort specification without keys.
    #[error("sort specification is empty")]
    EmptySort,
    /// The requested page size is out of bounds.
    #[error("limit must be between 1 and {max}, got {limit}")]
    InvalidLimit {
        /// Requested limit.
        limit: u64,
        /// Configured maximum.
        max: u64,
    },
}

impl SortError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidLimit { .. } => "invalid_limit",
            _ => "invalid_sort",
        }
    }
}

/// Errors that can occur when parsing a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CursorError {
    /// The base64 encoding is invalid.
    #[error("invalid base64 encoding in cursor")]
    InvalidBase64,
    /// The cursor format is invalid.
    #[error("invalid cursor format (expected JSON object)")]
    InvalidFormat,
    /// The cursor exceeds the maximum allowed size.
    #[error("cursor exceeds maximum size ({}KB limit)", MAX_CURSOR_SIZE / 1024)]
    TooLarge,
    /// The cursor has too many fields.
    #[error("cursor has too many fields (max {MAX_CURSOR_FIELDS})")]
    TooManyFields,
    /// The cursor keys do not match the sort keys of the request.
    #[error("cursor keys [{found}] do not match sort keys [{expected}]")]
    KeyMismatch {
        /// Sort keys of the request.
        expected: String,
        /// Keys stored in the cursor.
        found: String,
    },
}

impl CursorError {
    /// Returns `true` if this is an encoding/format error.
    ///
    /// Includes `InvalidBase64` and `InvalidFormat`.
    #[inline]
    #[must_use]
    pub const fn is_format_error(&self) -> bool {
        matches!(self, Self::InvalidBase64 | Self::InvalidFormat)
    }

    /// Returns `true` if this is a size/limit error.
    ///
    /// Includes `TooLarge` and `TooManyFields`.
    #[inline]
    #[must_use]
    pub const fn is_limit_error(&self) -> bool {
        matches!(self, Self::TooLarge | Self::TooManyFields)
    }
}

/// Programmer errors found while rendering a statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// A parent-qualified column rendered outside a correlated subquery.
    #[error("column `{0}` references the parent namespace, but none is set")]
    MissingNamespace(String),
    /// A SELECT with a WHERE clause or joins but no FROM table.
    #[error("SELECT has filters or joins but no FROM table")]
    MissingFrom,
    /// An INSERT without columns or rows.
    #[error("INSERT requires at least one column and one row")]
    EmptyInsert,
    /// An INSERT row whose width differs from the column list.
    #[error("INSERT row has {actual} values, expected {expected}")]
    RowWidthMismatch {
        /// Number of columns.
        expected: usize,
        /// Number of values in the row.
        actual: usize,
    },
    /// An UPDATE without assignments.
    #[error("UPDATE requires at least one assignment")]
    EmptyUpdate,
}

/// Startup-time registry misconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The tie-break key is not registered in the sort registry.
    #[error("tie-break key `{0}` is not registered")]
    MissingTieBreak(String),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Crate-level error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// See [`FilterError`].
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// See [`SortError`].
    #[error(transparent)]
    Sort(#[from] SortError),
    /// See [`CursorError`].
    #[error(transparent)]
    Cursor(#[from] CursorError),
    /// See [`RenderError`].
    #[error(transparent)]
    Render(#[from] RenderError),
    /// See [`RegistryError`].
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
}
