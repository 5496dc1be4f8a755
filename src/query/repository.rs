//! Executed CRUD operations for one record type.

use crate::db::executor::QueryExecutor;
use crate::db::session::PgSession;
use crate::error::{DbError, DbResult};
use crate::query::builder::QueryBuilder;
use crate::query::serializer::{Record, from_row, from_rows, to_params};
use crate::query::table::Table;
use serde_json::{Map, Value as JsonValue};
use sqlx::PgExecutor;
use std::marker::PhantomData;

/// CRUD over a [`Table`] for records of type `T`.
///
/// The executed forms accept any PostgreSQL executor: `&PgPool`, a pooled
/// connection, or `session.connection()` inside a scope. The `stage_*` forms
/// queue writes on a [`PgSession`] for the next flush.
pub struct Repository<T: Record> {
    table: Table,
    executor: QueryExecutor,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> QueryBuilder for Repository<T> {
    fn table(&self) -> &Table {
        &self.table
    }
}

impl<T: Record> Repository<T> {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            executor: QueryExecutor::new(),
            _record: PhantomData,
        }
    }

    pub fn with_executor(mut self, executor: QueryExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub async fn get_by_id<'c, E>(&self, executor: E, id: &T::Id) -> DbResult<Option<T>>
    where
        E: PgExecutor<'c>,
    {
        let query = self.get_by_id_query().compile();
        let params = query.bind(&T::id_params(id)?)?;
        let row = self.executor.fetch_optional(executor, &query, &params).await?;
        row.as_ref().map(from_row::<T>).transpose()
    }

    /// Like [`get_by_id`](Self::get_by_id), locking the row until the
    /// surrounding transaction ends.
    pub async fn get_by_id_for_update<'c, E>(&self, executor: E, id: &T::Id) -> DbResult<Option<T>>
    where
        E: PgExecutor<'c>,
    {
        let query = self.get_by_id_for_update_query().compile();
        let params = query.bind(&T::id_params(id)?)?;
        let row = self.executor.fetch_optional(executor, &query, &params).await?;
        row.as_ref().map(from_row::<T>).transpose()
    }

    pub async fn get_all<'c, E>(&self, executor: E) -> DbResult<Vec<T>>
    where
        E: PgExecutor<'c>,
    {
        let query = self.get_all_query().compile();
        let rows = self.executor.fetch_all(executor, &query, &[]).await?;
        from_rows(&rows)
    }

    /// Insert a record and return it as stored, including database defaults.
    pub async fn insert<'c, E>(&self, executor: E, record: &T) -> DbResult<T>
    where
        E: PgExecutor<'c>,
    {
        let query = self.insert_query().compile();
        let params = query.bind(&to_params(record)?)?;
        match self.executor.fetch_optional(executor, &query, &params).await? {
            Some(row) => from_row(&row),
            None => Err(DbError::internal(format!(
                "INSERT into '{}' returned no row",
                self.table.name()
            ))),
        }
    }

    /// Update every non-key column. Returns the number of rows changed.
    pub async fn update<'c, E>(&self, executor: E, record: &T) -> DbResult<u64>
    where
        E: PgExecutor<'c>,
    {
        let query = self.update_query()?.compile();
        let params = query.bind(&self.update_values(record)?)?;
        self.executor.execute(executor, &query, &params).await
    }

    pub async fn delete_by_id<'c, E>(&self, executor: E, id: &T::Id) -> DbResult<u64>
    where
        E: PgExecutor<'c>,
    {
        let query = self.delete_by_id_query().compile();
        let params = query.bind(&T::id_params(id)?)?;
        self.executor.execute(executor, &query, &params).await
    }

    pub async fn delete_all<'c, E>(&self, executor: E) -> DbResult<u64>
    where
        E: PgExecutor<'c>,
    {
        let query = self.delete_all_query().compile();
        self.executor.execute(executor, &query, &[]).await
    }

    pub fn stage_insert(&self, session: &mut PgSession, record: &T) -> DbResult<()> {
        session.add(&self.insert_query(), &to_params(record)?)
    }

    pub fn stage_update(&self, session: &mut PgSession, record: &T) -> DbResult<()> {
        session.add(&self.update_query()?, &self.update_values(record)?)
    }

    pub fn stage_delete(&self, session: &mut PgSession, id: &T::Id) -> DbResult<()> {
        session.add(&self.delete_by_id_query(), &T::id_params(id)?)
    }

    /// Column values plus the key bindings the predicate refers to.
    fn update_values(&self, record: &T) -> DbResult<Map<String, JsonValue>> {
        let mut values = to_params(record)?;
        values.extend(T::id_params(&record.instance_id())?);
        Ok(values)
    }
}
