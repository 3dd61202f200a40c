//! Validation of trusted SQL fragments registered from code.
//!
//! Table names, column names, aliases and fixed JSON paths are written into
//! SQL text verbatim, so they are checked once when a registry or builder is
//! constructed. Failing these checks is a programmer error and panics.
//! Values supplied by callers never reach these positions; they are always
//! bound as parameters.

/// Maximum length for SQL identifiers (`PostgreSQL` limit is 63).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Maximum length of a fixed JSON path.
const MAX_JSON_PATH_LENGTH: usize = 256;

/// Validate that a string is a safe SQL identifier.
///
/// A valid SQL identifier starts with an ASCII letter or underscore, contains
/// only ASCII letters, digits and underscores, and is 1 to 63 bytes long.
///
/// ```
/// use sqlsift::is_valid_sql_identifier;
///
/// assert!(is_valid_sql_identifier("organizationId"));
/// assert!(is_valid_sql_identifier("_private"));
/// assert!(!is_valid_sql_identifier("user.id"));
/// assert!(!is_valid_sql_identifier("users; DROP"));
/// ```
#[inline]
#[must_use]
pub fn is_valid_sql_identifier(s: &str) -> bool {
    if s.is_empty() || s.len() > MAX_IDENTIFIER_LENGTH {
        return false;
    }

    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Assert that a string is a valid SQL identifier.
///
/// # Panics
///
/// Panics with a descriptive message naming `context` when the identifier is
/// invalid.
///
/// ```should_panic
/// use sqlsift::assert_valid_sql_identifier;
///
/// assert_valid_sql_identifier("members m", "table");
/// ```
#[inline]
#[track_caller]
pub fn assert_valid_sql_identifier(s: &str, context: &str) {
    assert!(
        is_valid_sql_identifier(s),
        "Invalid SQL {context} name '{s}': must start with letter/underscore, \
             contain only ASCII alphanumeric/underscore, and be 1-63 chars"
    );
}

/// Validate a fixed JSON path such as `$.name`, `$.answers[0]` or `$."first name"`.
///
/// Fixed paths are rendered as quoted SQL literals, so single quotes,
/// backslashes and control characters are rejected outright.
///
/// ```
/// use sqlsift::is_valid_json_path;
///
/// assert!(is_valid_json_path("$"));
/// assert!(is_valid_json_path("$.settings.dog"));
/// assert!(is_valid_json_path("$.tags[2]"));
/// assert!(!is_valid_json_path("$.a' OR 1=1"));
/// assert!(!is_valid_json_path("name"));
/// ```
#[must_use]
pub fn is_valid_json_path(path: &str) -> bool {
    if path.len() > MAX_JSON_PATH_LENGTH {
        return false;
    }
    let Some(mut rest) = path.strip_prefix('$') else {
        return false;
    };

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('.') {
            if let Some(quoted) = after.strip_prefix('"') {
                let Some(end) = quoted.find('"') else {
                    return false;
                };
                let label = &quoted[..end];
                if label.is_empty() || label.chars().any(|c| c == '\'' || c == '\\' || c.is_control()) {
                    return false;
                }
                rest = &quoted[end + 1..];
            } else {
                let end = after
                    .find(|c: char| c == '.' || c == '[')
                    .unwrap_or(after.len());
                if !is_valid_sql_identifier(&after[..end]) {
                    return false;
                }
                rest = &after[end..];
            }
        } else if let Some(after) = rest.strip_prefix('[') {
            let Some(end) = after.find(']') else {
                return false;
            };
            let index = &after[..end];
            if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
                return false;
            }
            rest = &after[end + 1..];
        } else {
            return false;
        }
    }
    true
}

/// Assert that a string is a valid fixed JSON path.
///
/// # Panics
///
/// Panics when [`is_valid_json_path`] rejects the path.
#[inline]
#[track_caller]
pub fn assert_valid_json_path(path: &str) {
    assert!(
        is_valid_json_path(path),
        "Invalid fixed JSON path '{path}': expected `$` followed by `.key`, `.\"label\"` or `[n]` steps"
    );
}
