//! Template markers and filter merging.
//!
//! A template is a filter built by trusted code with a [`Filter::Marker`]
//! where the untrusted filter must supply a value, e.g. the ids of the
//! organizations a query is scoped to.

use super::Filter;
use crate::error::{FilterError, FilterErrorKind};

/// Return the part of `filter` found at the marker position of `template`.
///
/// Conjunctions are searched, alternatives and negations never are: a scope
/// inside `$or` or `$not` does not restrict the query.
///
/// ```
/// use sqlsift::filter::{self, Filter, unwrap_filter};
///
/// let template = filter::field("organizationId", Filter::Marker);
/// let user = sqlsift::parse_filter(r#"{"organizationId": {"$in": [1, 2]}, "name": "ann"}"#).unwrap();
///
/// let scope = unwrap_filter(&user, &template).unwrap();
/// assert!(matches!(scope, Filter::In(v) if v.len() == 2));
/// ```
#[must_use]
pub fn unwrap_filter<'a>(filter: &'a Filter, template: &Filter) -> Option<&'a Filter> {
    if matches!(template, Filter::Marker) {
        return Some(filter);
    }
    if let Filter::And(children) = filter {
        return children.iter().find_map(|child| unwrap_filter(child, template));
    }
    match (filter, template) {
        (_, Filter::And(templates)) if templates.len() == 1 => {
            templates.first().and_then(|t| unwrap_filter(filter, t))
        },
        (
            Filter::Field { name, filter },
            Filter::Field {
                name: template_name,
                filter: template,
            },
        ) if name == template_name => unwrap_filter(filter, template),
        (Filter::ElemMatch(filter), Filter::ElemMatch(template)) => unwrap_filter(filter, template),
        _ => None,
    }
}

/// Like [`unwrap_filter`], but a missing scope is an `invalid_filter` error.
pub fn require_scope<'a>(filter: &'a Filter, template: &Filter) -> Result<&'a Filter, FilterError> {
    unwrap_filter(filter, template)
        .ok_or_else(|| FilterError::at_root(FilterErrorKind::MissingScope))
}

/// AND a trusted filter with an untrusted one.
///
/// Empty filters are dropped so the result stays as small as its inputs.
#[must_use]
pub fn merge_filters(trusted: Filter, user: Filter) -> Filter {
    match (trusted.is_empty(), user.is_empty()) {
        (_, true) => trusted,
        (true, false) => user,
        (false, false) => Filter::And(vec![trusted, user]),
    }
}
