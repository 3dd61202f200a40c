//! Opaque cursor tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CursorError, MAX_CURSOR_FIELDS, MAX_CURSOR_SIZE, SortError};
use crate::filter::{CompareValue, Filter};

use super::{KeysetCondition, SortField, SortRegistry};

/// The sort-key tuple of the last row of a page.
///
/// Encoded as URL-safe base64 of a JSON object whose members keep the sort
/// order. Values are tagged, so integers, floats and datetimes come back
/// exactly as they went in.
///
/// # Security Note
///
/// Cursors are encoded, **not encrypted**, and clients can read and forge
/// them. A forged cursor only moves the page boundary: its values are bound
/// as parameters and filtered through the same registry as any filter.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "cursor must be encoded with .encode() or turned into a filter"]
pub struct Cursor {
    /// Sort keys and values, in sort order.
    pub fields: Vec<(String, CompareValue)>,
}

impl Cursor {
    /// Create a new empty cursor.
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a key.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<CompareValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Cursor of `row` under `sort`, tie-break included.
    pub fn from_row<T>(registry: &SortRegistry<T>, row: &T, sort: &[SortField]) -> Result<Self, SortError> {
        Ok(Self {
            fields: registry.values(row, sort)?,
        })
    }

    /// Encode to a URL-safe token.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serializing tagged scalars into a JSON object cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token produced by [`Cursor::encode`].
    ///
    /// ```
    /// use sqlsift::Cursor;
    ///
    /// let cursor = Cursor::new().field("score", 0.1 + 0.2).field("id", 42);
    /// assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    /// ```
    pub fn decode(encoded: &str) -> Result<Self, CursorError> {
        if encoded.len() > MAX_CURSOR_SIZE {
            return Err(CursorError::TooLarge);
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| CursorError::InvalidBase64)?;
        let object: Map<String, JsonValue> =
            serde_json::from_slice(&bytes).map_err(|_| CursorError::InvalidFormat)?;
        if object.len() > MAX_CURSOR_FIELDS {
            return Err(CursorError::TooManyFields);
        }
        let fields = object
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value(value)
                    .map(|value| (key, value))
                    .map_err(|_| CursorError::InvalidFormat)
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { fields })
    }

    /// The values of the cursor, checked against the keys of `sort`.
    pub fn values_for(&self, sort: &[SortField]) -> Result<Vec<CompareValue>, CursorError> {
        let matches = self.fields.len() == sort.len()
            && self
                .fields
                .iter()
                .zip(sort)
                .all(|((key, _), field)| *key == field.key);
        if !matches {
            return Err(CursorError::KeyMismatch {
                expected: sort
                    .iter()
                    .map(|f| f.key.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                found: self
                    .fields
                    .iter()
                    .map(|(key, _)| key.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(self.fields.iter().map(|(_, value)| value.clone()).collect())
    }

    /// Filter selecting the rows after this cursor under `sort`.
    ///
    /// `sort` must be the resolved specification the cursor was made with.
    pub fn to_filter(&self, sort: &[SortField]) -> Result<Filter, CursorError> {
        Ok(KeysetCondition::after(sort, self)?.to_filter())
    }
}

impl Serialize for Cursor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
