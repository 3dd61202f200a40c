//! Execution seam and query diagnostics.
//!
//! The crate never talks to a database itself. A [`Driver`] executes
//! rendered statements; an [`Executor`] renders builders with the driver's
//! dialect, skips statements whose WHERE clause is statically false and
//! routes every round-trip through a [`QueryLogger`].
//!
//! Logging uses `tracing` with these targets:
//!
//! | Target | Level | Event |
//! |--------|-------|-------|
//! | `sqlsift::slow_query` | warn | query slower than the threshold |
//! | `sqlsift::full_scan` | warn | EXPLAIN of a slow query shows a full table scan |
//! | `sqlsift::execute` | debug | query skipped because it cannot match |

use std::error::Error as StdError;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::DiagnosticsConfig;
use crate::dialect::Dialect;
use crate::error::Error;
use crate::expr::{CompareOp, Condition, Expr, Sql, ToSql, Value};
use crate::query::{Insert, OrderBy, Select, Update};

/// One step of a query plan, as reported by `EXPLAIN`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Table the step reads.
    pub table: String,
    /// Access method as reported by the database (e.g. `ALL`, `ref`, `SCAN`).
    pub access: String,
    /// The step reads every row of the table.
    pub full_scan: bool,
}

/// Executes rendered statements.
///
/// Implementations own connections, transactions and cancellation.
pub trait Driver {
    /// Dialect statements are rendered in.
    type Dialect: Dialect;
    /// A result row.
    type Row;
    /// Driver failure, passed through unchanged.
    type Error: StdError + Send + Sync + 'static;

    /// The dialect of the connection.
    fn dialect(&self) -> Self::Dialect;

    /// Run a query returning rows.
    fn query(&self, sql: &Sql) -> Result<Vec<Self::Row>, Self::Error>;

    /// Run a query returning a single numeric value; `None` for SQL `NULL`.
    fn query_scalar(&self, sql: &Sql) -> Result<Option<f64>, Self::Error>;

    /// Run a statement, returning the number of affected rows.
    fn execute(&self, sql: &Sql) -> Result<u64, Self::Error>;

    /// Query plan of `sql`, typically by running [`Sql::explain`]. Drivers
    /// without plan support return no steps.
    fn explain(&self, _sql: &Sql) -> Result<Vec<PlanStep>, Self::Error> {
        Ok(Vec::new())
    }
}

/// Error of an [`Executor`] call.
#[derive(Debug, Error)]
pub enum ExecError<E: StdError + 'static> {
    /// The statement could not be built or rendered.
    #[error(transparent)]
    Query(#[from] Error),
    /// The driver failed.
    #[error("driver error: {0}")]
    Driver(#[source] E),
}

/// Observes every round-trip of an [`Executor`].
pub trait QueryLogger {
    /// Run `run` against `driver` for the statement `sql`.
    fn log<D, R, F>(&self, driver: &D, sql: &Sql, run: F) -> Result<R, D::Error>
    where
        D: Driver,
        F: FnOnce(&D) -> Result<R, D::Error>;
}

/// Logger that only runs the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl QueryLogger for NoopLogger {
    fn log<D, R, F>(&self, driver: &D, _sql: &Sql, run: F) -> Result<R, D::Error>
    where
        D: Driver,
        F: FnOnce(&D) -> Result<R, D::Error>,
    {
        run(driver)
    }
}

/// What [`SlowQueryLogger`] recorded about the last slow query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlowQueryReport {
    /// SQL text.
    pub sql: String,
    /// Number of bound parameters.
    pub params: usize,
    /// Wall-clock time of the round-trip.
    pub elapsed: Duration,
    /// Plan steps, when `EXPLAIN` ran.
    pub plan: Vec<PlanStep>,
}

impl SlowQueryReport {
    /// Returns `true` if any plan step scans a whole table.
    #[must_use]
    pub fn has_full_scan(&self) -> bool {
        self.plan.iter().any(|step| step.full_scan)
    }
}

/// Warns about queries slower than a fixed threshold.
///
/// The threshold comes from configuration and never changes at runtime.
#[derive(Debug)]
pub struct SlowQueryLogger {
    threshold: Duration,
    explain: bool,
    last: Mutex<Option<SlowQueryReport>>,
}

impl SlowQueryLogger {
    /// Create a logger from configuration.
    #[must_use]
    pub const fn new(config: &DiagnosticsConfig) -> Self {
        Self {
            threshold: Duration::from_millis(config.slow_query_threshold_ms),
            explain: config.explain_slow_queries,
            last: Mutex::new(None),
        }
    }

    /// The most recent slow query.
    #[must_use]
    pub fn last_report(&self) -> Option<SlowQueryReport> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn plan<D: Driver>(&self, driver: &D, sql: &Sql) -> Vec<PlanStep> {
        if !self.explain {
            return Vec::new();
        }
        match driver.explain(sql) {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(target: "sqlsift::slow_query", error = %err, "EXPLAIN failed");
                Vec::new()
            },
        }
    }
}

impl QueryLogger for SlowQueryLogger {
    fn log<D, R, F>(&self, driver: &D, sql: &Sql, run: F) -> Result<R, D::Error>
    where
        D: Driver,
        F: FnOnce(&D) -> Result<R, D::Error>,
    {
        let start = Instant::now();
        let result = run(driver);
        let elapsed = start.elapsed();
        if elapsed < self.threshold {
            return result;
        }

        tracing::warn!(
            target: "sqlsift::slow_query",
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            sql = %sql.sql,
            params = sql.params.len(),
            "slow query"
        );
        let plan = self.plan(driver, sql);
        for step in plan.iter().filter(|step| step.full_scan) {
            tracing::warn!(
                target: "sqlsift::full_scan",
                table = %step.table,
                access = %step.access,
                sql = %sql.sql,
                "full table scan"
            );
        }
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(SlowQueryReport {
            sql: sql.sql.clone(),
            params: sql.params.len(),
            elapsed,
            plan,
        });
        result
    }
}

/// Runs builders through a [`Driver`].
#[derive(Debug)]
pub struct Executor<D, L = NoopLogger> {
    driver: D,
    logger: L,
}

impl<D: Driver> Executor<D> {
    /// Executor without diagnostics.
    pub const fn new(driver: D) -> Self {
        Self {
            driver,
            logger: NoopLogger,
        }
    }
}

impl<D: Driver, L: QueryLogger> Executor<D, L> {
    /// Executor logging through `logger`.
    pub const fn with_logger(driver: D, logger: L) -> Self {
        Self { driver, logger }
    }

    /// The driver.
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The logger.
    pub const fn logger(&self) -> &L {
        &self.logger
    }

    fn render<Q: ToSql>(&self, statement: &Q) -> Result<Sql, ExecError<D::Error>> {
        statement
            .to_sql(self.driver.dialect())
            .map_err(|err| ExecError::Query(err.into()))
    }

    fn skipped(kind: &'static str) {
        tracing::debug!(target: "sqlsift::execute", kind, "WHERE clause cannot match, query skipped");
    }

    /// Rows of `select`. A statically false WHERE returns no rows without a round-trip.
    pub fn fetch(&self, select: &Select) -> Result<Vec<D::Row>, ExecError<D::Error>> {
        if select.is_always() == Some(false) {
            Self::skipped("select");
            return Ok(Vec::new());
        }
        let sql = self.render(select)?;
        self.logger
            .log(&self.driver, &sql, |driver| driver.query(&sql))
            .map_err(ExecError::Driver)
    }

    fn scalar(&self, select: &Select) -> Result<Option<f64>, ExecError<D::Error>> {
        let sql = self.render(select)?;
        self.logger
            .log(&self.driver, &sql, |driver| driver.query_scalar(&sql))
            .map_err(ExecError::Driver)
    }

    /// Number of rows `select` matches.
    pub fn count(&self, select: Select) -> Result<u64, ExecError<D::Error>> {
        if select.is_always() == Some(false) {
            Self::skipped("count");
            return Ok(0);
        }
        let value = self.scalar(&select.into_count(None))?;
        Ok(value.map_or(0, |v| v.max(0.0) as u64))
    }

    /// Sum of `expr` over the rows `select` matches; 0 when none match.
    pub fn sum(&self, select: Select, expr: Expr) -> Result<f64, ExecError<D::Error>> {
        if select.is_always() == Some(false) {
            Self::skipped("sum");
            return Ok(0.0);
        }
        Ok(self.scalar(&select.into_sum(expr))?.unwrap_or(0.0))
    }

    /// Whether `select` matches any row.
    pub fn exists(&self, select: Select) -> Result<bool, ExecError<D::Error>> {
        if select.is_always() == Some(false) {
            Self::skipped("exists");
            return Ok(false);
        }
        Ok(self
            .scalar(&select.into_exists())?
            .is_some_and(|v| v != 0.0))
    }

    /// Run an INSERT, returning the number of affected rows.
    pub fn execute_insert(&self, insert: &Insert) -> Result<u64, ExecError<D::Error>> {
        let sql = self.render(insert)?;
        self.logger
            .log(&self.driver, &sql, |driver| driver.execute(&sql))
            .map_err(ExecError::Driver)
    }

    /// Run an UPDATE. A statically false WHERE affects no rows without a round-trip.
    pub fn execute_update(&self, update: &Update) -> Result<u64, ExecError<D::Error>> {
        if update.is_always() == Some(false) {
            Self::skipped("update");
            return Ok(0);
        }
        let sql = self.render(update)?;
        self.logger
            .log(&self.driver, &sql, |driver| driver.execute(&sql))
            .map_err(ExecError::Driver)
    }

    /// Iterate over every row of `select` in batches, by ascending `id`.
    ///
    /// `select` must not carry its own ORDER BY or LIMIT. `id_of` reads the
    /// `id` of a row; each batch starts after the last id of the previous one.
    pub fn batches<F>(&self, select: Select, id_of: F, batch_size: u64) -> Batches<'_, D, L, F>
    where
        F: Fn(&D::Row) -> Value,
    {
        Batches {
            executor: self,
            select,
            id_of,
            batch_size: batch_size.max(1),
            last: None,
            done: false,
        }
    }
}

/// Iterator returned by [`Executor::batches`].
#[derive(Debug)]
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Batches<'a, D, L, F> {
    executor: &'a Executor<D, L>,
    select: Select,
    id_of: F,
    batch_size: u64,
    last: Option<Value>,
    done: bool,
}

impl<D, L, F> Iterator for Batches<'_, D, L, F>
where
    D: Driver,
    L: QueryLogger,
    F: Fn(&D::Row) -> Value,
{
    type Item = Result<Vec<D::Row>, ExecError<D::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut select = self.select.clone();
        if let Some(last) = &self.last {
            select = select.where_condition(Condition::compare(
                Expr::column("id"),
                CompareOp::Gt,
                Expr::Param(last.clone()),
            ));
        }
        let select = select
            .order_by(OrderBy::asc(Expr::column("id")))
            .limit(self.batch_size);

        let rows = match self.executor.fetch(&select) {
            Ok(rows) => rows,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            },
        };
        if u64::try_from(rows.len()).map_or(true, |len| len < self.batch_size) {
            self.done = true;
        }
        let last = rows.last()?;
        self.last = Some((self.id_of)(last));
        Some(Ok(rows))
    }
}
