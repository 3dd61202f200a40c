//! Page requests and responses.

use serde::{Deserialize, Serialize};

use crate::compile::{Compiled, Compiler, FilterRegistry};
use crate::config::CompilerConfig;
use crate::error::{Error, SortError};
use crate::expr::Condition;
use crate::filter::Filter;
use crate::query::Select;

use super::{Cursor, KeysetCondition, SortField, SortRegistry};

/// A request for one page of an entity.
///
/// The next request is derived from the last row of the current page with
/// [`PageRequest::next_page`]; callers never compute offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    /// Caller filter.
    pub filter: Filter,
    /// Position after which the page starts.
    pub cursor: Option<Cursor>,
    /// Sort specification, before the tie-break is appended.
    pub sort: Vec<SortField>,
    /// Page size.
    pub limit: u64,
}

impl PageRequest {
    /// First page with no filter, default sort and the default page size.
    #[must_use]
    pub fn new(config: &CompilerConfig) -> Self {
        Self {
            filter: Filter::default(),
            cursor: None,
            sort: Vec::new(),
            limit: config.default_limit,
        }
    }

    /// Set the filter.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the sort specification.
    #[must_use]
    pub fn sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = sort;
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Start after `cursor`.
    #[must_use]
    pub fn cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    /// Reject a page size of 0 or above the configured maximum.
    pub const fn validate_limit(&self, config: &CompilerConfig) -> Result<(), SortError> {
        if self.limit == 0 || self.limit > config.max_limit {
            return Err(SortError::InvalidLimit {
                limit: self.limit,
                max: config.max_limit,
            });
        }
        Ok(())
    }

    /// Build the SELECT for this page on top of `base`.
    ///
    /// The caller filter is compiled through `filters`. The keyset predicate
    /// of the cursor compares the `ORDER BY` expressions of `sorts` directly,
    /// so sort keys need no filter field.
    pub fn build_select<T>(
        &self,
        base: Select,
        filters: &FilterRegistry,
        sorts: &SortRegistry<T>,
        compiler: &Compiler,
    ) -> Result<Select, Error> {
        let sort = sorts.assert_sort(&self.sort)?;
        let mut predicate = compiler.compile(&self.filter, filters)?;
        if let Some(cursor) = &self.cursor {
            let keyset = KeysetCondition::after(&sort, cursor)?.to_condition(sorts)?;
            predicate = predicate.and(match keyset {
                Condition::Or(branches) if branches.is_empty() => Compiled::AlwaysFalse,
                keyset => Compiled::Expression(keyset),
            });
        }
        let select = sorts
            .apply(base.where_compiled(predicate), &sort)?
            .limit(self.limit);
        Ok(match compiler.query_timeout_ms() {
            Some(ms) => select.max_execution_time(ms),
            None => select,
        })
    }

    /// The request for the page after `rows`, if there can be one.
    ///
    /// Returns `None` when the page is not full, or when the cursor would not
    /// advance (a broken sort definition would otherwise loop forever).
    pub fn next_page<T>(&self, rows: &[T], sorts: &SortRegistry<T>) -> Result<Option<Self>, SortError> {
        let full = u64::try_from(rows.len()).is_ok_and(|len| len >= self.limit);
        let Some(last) = rows.last().filter(|_| full) else {
            return Ok(None);
        };
        let cursor = Cursor::from_row(sorts, last, &self.sort)?;
        if self.cursor.as_ref() == Some(&cursor) {
            tracing::error!(
                target: "sqlsift::paginate",
                cursor = %cursor.encode(),
                "next page cursor equals the current one, stopping pagination"
            );
            return Ok(None);
        }
        Ok(Some(Self {
            cursor: Some(cursor),
            ..self.clone()
        }))
    }

    /// Response summary for a page of `rows`.
    pub fn page_info<T>(&self, rows: &[T], sorts: &SortRegistry<T>) -> Result<PageInfo, SortError> {
        Ok(PageInfo::new(self.next_page(rows, sorts)?.as_ref()))
    }
}

/// Page information for paginated responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Whether another page may follow.
    pub has_next: bool,
    /// Encoded cursor of the next page.
    pub next_cursor: Option<String>,
}

impl PageInfo {
    /// Summary for the given next request.
    #[must_use]
    pub fn new(next: Option<&PageRequest>) -> Self {
        let next_cursor = next.and_then(|n| n.cursor.as_ref()).map(Cursor::encode);
        Self {
            has_next: next_cursor.is_some(),
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{ColumnDescriptor, SemanticType};
    use crate::dialect::Mysql;
    use crate::expr::{ToSql, Value};
    use crate::sort::SortDefinition;
    use crate::sort::tests::{Member, registry};

    fn filters() -> FilterRegistry {
        FilterRegistry::new()
            .column("id", ColumnDescriptor::column("id", SemanticType::Number))
            .column("name", ColumnDescriptor::column("name", SemanticType::String).nullable())
    }

    fn member(id: i64, name: &'static str) -> Member {
        Member {
            id,
            name: Some(name),
            group: "g",
        }
    }

    #[test]
    fn test_validate_limit() {
        let config = CompilerConfig::default();
        assert!(PageRequest::new(&config).validate_limit(&config).is_ok());
        assert!(PageRequest::new(&config).limit(100).validate_limit(&config).is_ok());

        let err = PageRequest::new(&config).limit(0).validate_limit(&config).unwrap_err();
        assert_eq!(err, SortError::InvalidLimit { limit: 0, max: 100 });
        assert_eq!(err.code(), "invalid_limit");
        assert!(PageRequest::new(&config).limit(101).validate_limit(&config).is_err());
    }

    #[test]
    fn test_build_select_with_cursor() {
        let config = CompilerConfig::default();
        let compiler = Compiler::new(&config);
        let request = PageRequest::new(&config)
            .sort(vec![SortField::desc("name")])
            .cursor(Cursor::new().field("name", "ann").field("id", 7))
            .limit(2);

        let select = request
            .build_select(Select::new().from("members"), &filters(), &registry(), &compiler)
            .unwrap();
        let sql = select.to_sql(Mysql).unwrap();
        assert_eq!(
            sql.sql,
            "SELECT * FROM members WHERE LOWER(members.name) IS NULL OR LOWER(members.name) < ? \
             OR (LOWER(members.name) = ? AND members.id > ?) \
             ORDER BY LOWER(members.name) DESC, members.id ASC LIMIT 2"
        );
        assert_eq!(
            sql.params,
            vec![Value::from("ann"), Value::from("ann"), Value::Int(7)]
        );
    }

    #[test]
    fn test_build_select_attaches_timeout() {
        let config = CompilerConfig {
            query_timeout_ms: Some(3000),
            ..CompilerConfig::default()
        };
        let select = PageRequest::new(&config)
            .build_select(
                Select::new().from("members"),
                &filters(),
                &registry(),
                &Compiler::new(&config),
            )
            .unwrap();
        assert_eq!(
            select.to_sql(Mysql).unwrap().sql,
            "SELECT /*+ MAX_EXECUTION_TIME(3000) */ * FROM members ORDER BY members.id ASC LIMIT 25"
        );
    }

    #[test]
    fn test_build_select_rejects_stale_cursor() {
        let config = CompilerConfig::default();
        let request = PageRequest::new(&config)
            .sort(vec![SortField::asc("name")])
            .cursor(Cursor::new().field("id", 7));
        let err = request
            .build_select(
                Select::new().from("members"),
                &filters(),
                &registry(),
                &Compiler::new(&config),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Cursor(_)));
    }

    #[test]
    fn test_next_page() {
        let config = CompilerConfig::default();
        let request = PageRequest::new(&config).limit(2);
        let rows = [member(1, "a"), member(2, "b")];

        let next = request.next_page(&rows, &registry()).unwrap().unwrap();
        assert_eq!(next.cursor, Some(Cursor::new().field("id", 2)));
        assert_eq!(next.limit, 2);

        assert_eq!(request.next_page(&rows[..1], &registry()).unwrap(), None);
        assert_eq!(request.next_page::<Member>(&[], &registry()).unwrap(), None);
    }

    #[test]
    fn test_next_page_stops_when_cursor_does_not_advance() {
        // A tie-break that ignores the row never moves the cursor.
        let broken = SortRegistry::<Member>::builder("id")
            .key("id", SortDefinition::column("id", |_: &Member| 1.into()))
            .build()
            .unwrap();
        let config = CompilerConfig::default();
        let request = PageRequest::new(&config)
            .limit(1)
            .cursor(Cursor::new().field("id", 1));
        assert_eq!(request.next_page(&[member(5, "x")], &broken).unwrap(), None);
    }

    #[test]
    fn test_page_info() {
        let config = CompilerConfig::default();
        let request = PageRequest::new(&config).limit(1);
        let info = request.page_info(&[member(3, "c")], &registry()).unwrap();
        assert!(info.has_next);
        assert_eq!(
            Cursor::decode(info.next_cursor.as_deref().unwrap()).unwrap(),
            Cursor::new().field("id", 3)
        );

        let info = PageInfo::new(None);
        assert!(!info.has_next);
        assert_eq!(info.next_cursor, None);
    }
}
