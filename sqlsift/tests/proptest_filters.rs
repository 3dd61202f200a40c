//! Property-based tests for filter compilation and keyset pagination.
//!
//! These tests generate random filters and data sets to check the
//! invariants that hold for every input, not just the hand-picked ones.

use chrono::DateTime;
use common::SqliteDriver;
use proptest::prelude::*;
use rusqlite::Connection;
use rusqlite::types::Value as SqliteValue;
use serde_json::{Value as JsonValue, json};
use sqlsift::{
    ColumnDescriptor, Compiler, CompilerConfig, Cursor, Executor, FilterErrorKind, FilterRegistry,
    Mysql, PageRequest, Postgres, Select, SemanticType, SortDefinition, SortField, SortRegistry,
    ToSql,
};

mod common;

fn registry() -> FilterRegistry {
    FilterRegistry::new()
        .column("id", ColumnDescriptor::column("id", SemanticType::Number))
        .column(
            "name",
            ColumnDescriptor::column("name", SemanticType::String).nullable(),
        )
        .column("age", ColumnDescriptor::column("age", SemanticType::Number))
        .column(
            "createdAt",
            ColumnDescriptor::column("createdAt", SemanticType::Datetime),
        )
}

fn compiler() -> Compiler {
    let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap_or_default();
    Compiler::new(&CompilerConfig::default()).with_now(now)
}

// =============================================================================
// Strategies
// =============================================================================

fn leaf() -> impl Strategy<Value = JsonValue> {
    let op = prop_oneof![
        Just("$eq"),
        Just("$neq"),
        Just("$gt"),
        Just("$gte"),
        Just("$lt"),
        Just("$lte"),
    ];
    prop_oneof![
        (op.clone(), any::<i64>()).prop_map(|(op, n)| json!({"age": {op: n}})),
        (op.clone(), "[a-zA-Z' ;%_-]{0,12}").prop_map(|(op, s)| json!({"name": {op: s}})),
        op.prop_map(|op| json!({"name": {op: null}})),
        prop::collection::vec(prop::option::of(0i64..50), 0..6)
            .prop_map(|ids| json!({"id": {"$in": ids}})),
        Just(json!({"createdAt": {"$lt": {"$": "$now"}}})),
        "[a-z%_]{0,6}".prop_map(|s| json!({"name": {"$contains": s}})),
    ]
}

fn filter() -> impl Strategy<Value = JsonValue> {
    leaf().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(|fs| json!({"$and": fs})),
            prop::collection::vec(inner.clone(), 0..4).prop_map(|fs| json!({"$or": fs})),
            inner.prop_map(|f| json!({"$not": f})),
        ]
    })
}

// =============================================================================
// Compilation Property Tests
// =============================================================================

proptest! {
    /// Compiling the same filter twice yields the same SQL and parameters.
    #[test]
    fn compilation_is_deterministic(filter in filter()) {
        let registry = registry();
        let first = compiler().compile_json(&filter, &registry).unwrap();
        let second = compiler().compile_json(&filter, &registry).unwrap();
        prop_assert_eq!(first.to_sql(Postgres).unwrap(), second.to_sql(Postgres).unwrap());
    }

    /// Every placeholder has exactly one parameter.
    #[test]
    fn placeholders_match_params(filter in filter()) {
        let sql = compiler().compile_json(&filter, &registry()).unwrap().to_sql(Mysql).unwrap();
        prop_assert_eq!(sql.sql.matches('?').count(), sql.params.len());
    }

    /// Caller strings only ever travel as parameters.
    #[test]
    fn strings_are_never_inlined(value in "[a-z]{3,12}'[a-z; -]{1,12}") {
        let filter = json!({"name": value});
        let sql = compiler().compile_json(&filter, &registry()).unwrap().to_sql(Mysql).unwrap();
        prop_assert_eq!(sql.sql.as_str(), "LOWER(name) <=> ?");
        prop_assert!(!sql.sql.contains('\''));
    }

    /// `$not` of a filter and the filter partition every row: the
    /// negation never compiles to the same constant as the filter.
    #[test]
    fn negation_flips_constants(filter in filter()) {
        let registry = registry();
        let plain = compiler().compile_json(&filter, &registry).unwrap();
        let negated = compiler().compile_json(&json!({"$not": filter}), &registry).unwrap();
        prop_assert_eq!(plain.is_always_true(), negated.is_always_false());
        prop_assert_eq!(plain.is_always_false(), negated.is_always_true());
    }

    /// `$in` accepts up to 1000 values and rejects more.
    #[test]
    fn in_list_is_bounded(len in 990usize..1010) {
        let values: Vec<i64> = (0..len as i64).collect();
        let result = compiler().compile_json(&json!({"id": {"$in": values}}), &registry());
        if len <= 1000 {
            prop_assert!(result.is_ok());
        } else {
            let err = result.unwrap_err();
            prop_assert_eq!(err.kind, FilterErrorKind::TooManyValues { max: 1000, actual: len });
        }
    }

    /// Cursors decode to exactly what was encoded.
    #[test]
    fn cursor_encoding_is_lossless(
        n in any::<i64>(),
        f in any::<f64>().prop_filter("finite", |f| f.is_finite()),
        s in ".{0,40}",
    ) {
        let cursor = Cursor::new().field("n", n).field("f", f).field("s", s).field("id", 1);
        prop_assert_eq!(Cursor::decode(&cursor.encode()).unwrap(), cursor);
    }
}

// =============================================================================
// Pagination Property Tests
// =============================================================================

#[derive(Debug, Clone)]
struct Row {
    id: i64,
    name: Option<String>,
    age: i64,
}

fn sorts() -> SortRegistry<Row> {
    SortRegistry::builder("id")
        .key("id", SortDefinition::column("id", |r: &Row| r.id.into()))
        .key(
            "name",
            SortDefinition::text("name", |r: &Row| r.name.clone().into()),
        )
        .key("age", SortDefinition::column("age", |r: &Row| r.age.into()))
        .build()
        .unwrap()
}

fn load(rows: &[(Option<&str>, i64)]) -> Executor<SqliteDriver> {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE members (id INTEGER PRIMARY KEY, name TEXT, age INTEGER NOT NULL, \
         createdAt TEXT NOT NULL DEFAULT '2020-01-01T00:00:00Z')",
    )
    .unwrap();
    for (i, (name, age)) in rows.iter().enumerate() {
        conn.execute(
            "INSERT INTO members (id, name, age) VALUES (?1, ?2, ?3)",
            rusqlite::params![i as i64 + 1, name, age],
        )
        .unwrap();
    }
    Executor::new(SqliteDriver::new(conn))
}

fn to_row(values: &[SqliteValue]) -> Row {
    match values {
        [SqliteValue::Integer(id), name, SqliteValue::Integer(age)] => Row {
            id: *id,
            name: match name {
                SqliteValue::Text(s) => Some(s.clone()),
                _ => None,
            },
            age: *age,
        },
        other => panic!("unexpected row {other:?}"),
    }
}

fn base() -> Select {
    Select::new().from("members").columns(&["id", "name", "age"])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Walking pages returns every row exactly once, in ORDER BY order,
    /// whatever the ties, NULLs and page size.
    #[test]
    fn keyset_walk_is_complete(
        rows in prop::collection::vec(
            (prop::option::of(prop_oneof![Just("a"), Just("A"), Just("b"), Just("c")]), 0i64..3),
            0..25,
        ),
        sort in prop_oneof![
            Just("name"), Just("-name"), Just("age,name"), Just("-age,-name"), Just("name,-age"),
        ],
        limit in 1u64..6,
        filter in prop_oneof![
            Just(json!({})),
            Just(json!({"age": {"$gte": 1}})),
            Just(json!({"name": {"$neq": null}})),
        ],
    ) {
        let executor = load(&rows);
        let sorts = sorts();
        let config = CompilerConfig::default();
        let compiler = compiler();
        let filter = sqlsift::parse_filter_value(&filter).unwrap();
        let sort = SortField::parse_sort_string(sort).unwrap();

        let resolved = sorts.assert_sort(&sort).unwrap();
        let everything = compiler.compile(&filter, &registry()).unwrap();
        let expected: Vec<i64> = executor
            .fetch(&sorts.apply(base().where_compiled(everything), &resolved).unwrap())
            .unwrap()
            .iter()
            .map(|r| to_row(r).id)
            .collect();

        let mut request = Some(PageRequest::new(&config).filter(filter).sort(sort).limit(limit));
        let mut seen = Vec::new();
        while let Some(current) = request {
            prop_assert!(seen.len() <= rows.len(), "pagination does not terminate");
            let select = current.build_select(base(), &registry(), &sorts, &compiler).unwrap();
            let page: Vec<Row> = executor.fetch(&select).unwrap().iter().map(|r| to_row(r)).collect();
            prop_assert!(page.len() as u64 <= limit);
            seen.extend(page.iter().map(|r| r.id));
            request = current.next_page(&page, &sorts).unwrap();
        }
        prop_assert_eq!(seen, expected);
    }
}
