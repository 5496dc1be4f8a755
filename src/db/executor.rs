//! Query execution engine.
//!
//! Runs compiled statements against any PostgreSQL executor: a `&PgPool`, a
//! `&mut PgConnection`, or the connection behind an open session transaction.
//! Every call is bounded by a timeout.

use crate::config::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::db::params::build_postgres_query;
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::query::CompiledQuery;
use sqlx::PgExecutor;
use sqlx::postgres::PgRow;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// Query executor that handles statement execution.
#[derive(Debug, Clone, Copy)]
pub struct QueryExecutor {
    default_timeout: Duration,
}

impl QueryExecutor {
    /// Create a new query executor with default settings.
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }

    /// Create a new query executor with a custom timeout.
    pub fn with_timeout(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Fetch every row the statement returns.
    pub async fn fetch_all<'c, E>(
        &self,
        executor: E,
        query: &CompiledQuery,
        params: &[QueryParam],
    ) -> DbResult<Vec<PgRow>>
    where
        E: PgExecutor<'c>,
    {
        check_arity(query, params)?;
        let start = Instant::now();
        let rows = match timeout(
            self.default_timeout,
            build_postgres_query(query.sql(), params).fetch_all(executor),
        )
        .await
        {
            Ok(result) => result.map_err(DbError::from)?,
            Err(_) => return Err(self.timeout_error("query execution")),
        };

        debug!(
            sql = %query.sql(),
            params = params.len(),
            row_count = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Fetched rows"
        );
        Ok(rows)
    }

    /// Fetch at most one row.
    pub async fn fetch_optional<'c, E>(
        &self,
        executor: E,
        query: &CompiledQuery,
        params: &[QueryParam],
    ) -> DbResult<Option<PgRow>>
    where
        E: PgExecutor<'c>,
    {
        check_arity(query, params)?;
        match timeout(
            self.default_timeout,
            build_postgres_query(query.sql(), params).fetch_optional(executor),
        )
        .await
        {
            Ok(result) => result.map_err(DbError::from),
            Err(_) => Err(self.timeout_error("query execution")),
        }
    }

    /// Execute a write statement and return the number of affected rows.
    pub async fn execute<'c, E>(
        &self,
        executor: E,
        query: &CompiledQuery,
        params: &[QueryParam],
    ) -> DbResult<u64>
    where
        E: PgExecutor<'c>,
    {
        check_arity(query, params)?;
        let start = Instant::now();
        let rows_affected = match timeout(
            self.default_timeout,
            build_postgres_query(query.sql(), params).execute(executor),
        )
        .await
        {
            Ok(result) => result.map_err(DbError::from)?.rows_affected(),
            Err(_) => return Err(self.timeout_error("write operation")),
        };

        debug!(
            sql = %query.sql(),
            params = params.len(),
            rows_affected = rows_affected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Executed write"
        );
        Ok(rows_affected)
    }

    fn timeout_error(&self, operation: &str) -> DbError {
        DbError::timeout(operation, self.default_timeout.as_secs() as u32)
    }
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn check_arity(query: &CompiledQuery, params: &[QueryParam]) -> DbResult<()> {
    if query.param_count() != params.len() {
        return Err(DbError::invalid_input(format!(
            "Statement expects {} parameter(s), got {}",
            query.param_count(),
            params.len()
        )));
    }
    Ok(())
}
