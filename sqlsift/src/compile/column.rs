//! Column descriptors: the typed target of every leaf filter.

use std::fmt;

use crate::expr::{Column, Expr, JsonPath};

/// How values compared against a column are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// Text, compared case-insensitively.
    String,
    /// Integers and floats.
    Number,
    /// Timestamps.
    Datetime,
    /// Stored as 0/1.
    Boolean,
    /// A string inside a JSON document.
    JSONString,
    /// A JSON array holding a set of scalars.
    JSONArray,
    /// A JSON object; only comparable with null.
    JSONObject,
}

impl SemanticType {
    /// Returns `true` for the JSON variants.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::JSONString | Self::JSONArray | Self::JSONObject)
    }

    /// Returns `true` when values are compared as lowercased text.
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::String | Self::JSONString)
    }

    const fn name(self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Datetime => "Datetime",
            Self::Boolean => "Boolean",
            Self::JSONString => "JSONString",
            Self::JSONArray => "JSONArray",
            Self::JSONObject => "JSONObject",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A filterable SQL expression with its semantic type and nullability.
///
/// ```
/// use sqlsift::{ColumnDescriptor, SemanticType};
///
/// let name = ColumnDescriptor::column("firstName", SemanticType::String);
/// assert!(!name.nullable);
///
/// let birth_day = ColumnDescriptor::column("birthDay", SemanticType::Datetime).nullable();
/// assert!(birth_day.nullable);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    /// Expression compared against filter values.
    pub expression: Expr,
    /// Normalization rules.
    pub semantic_type: SemanticType,
    /// Whether the expression can be NULL (or a missing JSON member).
    pub nullable: bool,
}

impl ColumnDescriptor {
    /// A non-nullable descriptor for `expression`.
    pub fn new(expression: impl Into<Expr>, semantic_type: SemanticType) -> Self {
        Self {
            expression: expression.into(),
            semantic_type,
            nullable: false,
        }
    }

    /// A non-nullable descriptor for a column of the current table.
    #[track_caller]
    pub fn column(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self::new(Expr::column(name), semantic_type)
    }

    /// A descriptor for the value at a fixed path inside a JSON column.
    ///
    /// JSON members can always be missing, so the descriptor is nullable.
    #[track_caller]
    pub fn json(column: impl Into<String>, path: &str, semantic_type: SemanticType) -> Self {
        Self::new(
            Expr::column(column).json_extract(JsonPath::fixed(path)),
            semantic_type,
        )
        .nullable()
    }

    /// A text column stored either as a plain JSON string or as an object
    /// keyed by language, such as `{"nl": "Hond", "en": "Dog"}`.
    ///
    /// The value is read in `languages` order, so the first entry is the
    /// caller's language and the rest are fallbacks. A plain string at
    /// `path` is used when no language matches.
    ///
    /// ```
    /// use sqlsift::{ColumnDescriptor, SemanticType, Sqlite, ToSql};
    ///
    /// let name = ColumnDescriptor::translated("settings", "$.name", &["nl", "en"]);
    /// assert_eq!(name.semantic_type, SemanticType::String);
    /// assert!(name.expression.to_sql(Sqlite).unwrap().sql.starts_with(
    ///     "COALESCE(json_extract(settings, '$.name.nl'), json_extract(settings, '$.name.en'), CASE"
    /// ));
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `column` is not a valid identifier or a language does not
    /// form a valid fixed JSON path.
    #[track_caller]
    pub fn translated(column: impl Into<String>, path: &str, languages: &[&str]) -> Self {
        let column = Column::new(column);
        let mut candidates: Vec<Expr> = languages
            .iter()
            .map(|language| {
                Expr::Column(column.clone())
                    .json_extract(JsonPath::fixed(format!("{path}.{language}")))
                    .json_unquote()
            })
            .collect();
        candidates.push(Expr::json_string(column, path));
        Self::new(Expr::Coalesce(candidates), SemanticType::String).nullable()
    }

    /// Mark as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}
