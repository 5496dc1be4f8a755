//! CRUD statement builder keyed on a table's primary key.
//!
//! Implementors supply a [`Table`]; every statement comes from the default
//! methods of [`QueryBuilder`]. Values are referenced through named bind
//! markers and resolved at execution time by the compiler.

use crate::error::{DbError, DbResult};
use crate::query::compiler::{CompiledQuery, compile};
use crate::query::table::{Table, quote_ident};

/// Bind name for a single-column primary key value.
pub const INSTANCE_ID_PARAM: &str = "instance_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// SQL text with named bind markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    kind: StatementKind,
    sql: String,
}

impl Statement {
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Rewrite named markers into positional placeholders.
    pub fn compile(&self) -> CompiledQuery {
        compile(&self.sql)
    }

    /// True for statements that return rows.
    pub fn returns_rows(&self) -> bool {
        self.kind == StatementKind::Select || self.sql.contains(" RETURNING ")
    }
}

impl std::fmt::Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

pub trait QueryBuilder {
    fn table(&self) -> &Table;

    /// Predicate matching one row by primary key.
    ///
    /// A single key column binds `:instance_id`; composite keys bind each
    /// column under its own name.
    fn id_predicate(&self) -> String {
        let table = self.table();
        match table.primary_key() {
            [key] => format!(
                "{} = {}",
                quote_ident(key),
                bind_marker(table, key, INSTANCE_ID_PARAM)
            ),
            keys => keys
                .iter()
                .map(|k| format!("{} = {}", quote_ident(k), bind_marker(table, k, k)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    fn get_all_query(&self) -> Statement {
        let table = self.table();
        Statement::new(
            StatementKind::Select,
            format!(
                "SELECT {} FROM {}",
                column_list(table),
                table.qualified_name()
            ),
        )
    }

    fn get_by_id_query(&self) -> Statement {
        Statement::new(
            StatementKind::Select,
            format!("{} WHERE {}", self.get_all_query().sql(), self.id_predicate()),
        )
    }

    fn get_by_id_for_update_query(&self) -> Statement {
        Statement::new(
            StatementKind::Select,
            format!("{} FOR UPDATE", self.get_by_id_query().sql()),
        )
    }

    fn insert_query(&self) -> Statement {
        let table = self.table();
        let values = table
            .columns()
            .iter()
            .map(|c| bind_marker(table, c, c))
            .collect::<Vec<_>>()
            .join(", ");
        Statement::new(
            StatementKind::Insert,
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                table.qualified_name(),
                column_list(table),
                values,
                column_list(table)
            ),
        )
    }

    /// Update every non-key column of the row matching the key.
    fn update_query(&self) -> DbResult<Statement> {
        let table = self.table();
        let assignments = table
            .non_key_columns()
            .map(|c| format!("{} = {}", quote_ident(c), bind_marker(table, c, c)))
            .collect::<Vec<_>>();
        if assignments.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Table '{}' has no non-key columns to update",
                table.name()
            )));
        }
        Ok(Statement::new(
            StatementKind::Update,
            format!(
                "UPDATE {} SET {} WHERE {}",
                table.qualified_name(),
                assignments.join(", "),
                self.id_predicate()
            ),
        ))
    }

    fn delete_by_id_query(&self) -> Statement {
        Statement::new(
            StatementKind::Delete,
            format!("{} WHERE {}", self.delete_all_query().sql(), self.id_predicate()),
        )
    }

    fn delete_all_query(&self) -> Statement {
        Statement::new(
            StatementKind::Delete,
            format!("DELETE FROM {}", self.table().qualified_name()),
        )
    }
}

impl QueryBuilder for Table {
    fn table(&self) -> &Table {
        self
    }
}

/// `:name`, cast to the column's declared type when it has one.
fn bind_marker(table: &Table, column: &str, name: &str) -> String {
    match table.column_type(column) {
        Some(sql_type) => format!(":{}::{}", name, sql_type),
        None => format!(":{}", name),
    }
}

fn column_list(table: &Table) -> String {
    table
        .columns()
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Table {
        Table::new("users", ["id", "name", "email"]).unwrap()
    }

    fn registrations() -> Table {
        Table::with_primary_key("registrations", ["user_id", "event_id", "note"], [
            "user_id", "event_id",
        ])
        .unwrap()
    }

    #[test]
    fn test_get_all_query() {
        assert_eq!(
            users().get_all_query().sql(),
            r#"SELECT "id", "name", "email" FROM "users""#
        );
    }

    #[test]
    fn test_get_by_id_query() {
        let stmt = users().get_by_id_query();
        assert_eq!(stmt.kind(), StatementKind::Select);
        assert_eq!(
            stmt.sql(),
            r#"SELECT "id", "name", "email" FROM "users" WHERE "id" = :instance_id"#
        );
        assert_eq!(stmt.compile().param_names(), [INSTANCE_ID_PARAM]);
    }

    #[test]
    fn test_get_by_id_for_update_query() {
        assert!(
            users()
                .get_by_id_for_update_query()
                .sql()
                .ends_with(r#"WHERE "id" = :instance_id FOR UPDATE"#)
        );
    }

    #[test]
    fn test_insert_query() {
        let stmt = users().insert_query();
        assert_eq!(
            stmt.sql(),
            r#"INSERT INTO "users" ("id", "name", "email") VALUES (:id, :name, :email) RETURNING "id", "name", "email""#
        );
        assert!(stmt.returns_rows());
        let compiled = stmt.compile();
        assert!(compiled.sql().contains("VALUES ($1, $2, $3)"));
        assert_eq!(compiled.param_names(), ["id", "name", "email"]);
    }

    #[test]
    fn test_update_query() {
        let stmt = users().update_query().unwrap();
        assert_eq!(
            stmt.sql(),
            r#"UPDATE "users" SET "name" = :name, "email" = :email WHERE "id" = :instance_id"#
        );
        assert!(!stmt.returns_rows());
    }

    #[test]
    fn test_typed_columns_are_cast() {
        let table = Table::new("docs", ["id", "title", "created_at"])
            .unwrap()
            .with_column_type("id", "uuid")
            .unwrap()
            .with_column_type("created_at", "timestamptz")
            .unwrap();

        assert!(
            table
                .insert_query()
                .sql()
                .contains("VALUES (:id::uuid, :title, :created_at::timestamptz)")
        );
        assert_eq!(
            table.update_query().unwrap().sql(),
            r#"UPDATE "docs" SET "title" = :title, "created_at" = :created_at::timestamptz WHERE "id" = :instance_id::uuid"#
        );

        let compiled = table.get_by_id_query().compile();
        assert!(compiled.sql().ends_with(r#"WHERE "id" = $1::uuid"#));
        assert_eq!(compiled.param_names(), [INSTANCE_ID_PARAM]);
    }

    #[test]
    fn test_typed_composite_key_is_cast() {
        let table = registrations().with_column_type("event_id", "uuid").unwrap();
        assert_eq!(
            table.delete_by_id_query().sql(),
            r#"DELETE FROM "registrations" WHERE "user_id" = :user_id AND "event_id" = :event_id::uuid"#
        );
    }

    #[test]
    fn test_update_query_without_non_key_columns() {
        let table = Table::with_primary_key("links", ["a", "b"], ["a", "b"]).unwrap();
        assert!(matches!(
            table.update_query(),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_delete_queries() {
        assert_eq!(users().delete_all_query().sql(), r#"DELETE FROM "users""#);
        assert_eq!(
            users().delete_by_id_query().sql(),
            r#"DELETE FROM "users" WHERE "id" = :instance_id"#
        );
    }

    #[test]
    fn test_composite_key_predicate() {
        let stmt = registrations().delete_by_id_query();
        assert_eq!(
            stmt.sql(),
            r#"DELETE FROM "registrations" WHERE "user_id" = :user_id AND "event_id" = :event_id"#
        );
        assert_eq!(stmt.compile().param_names(), ["user_id", "event_id"]);
    }

    #[test]
    fn test_schema_qualified_statements() {
        let table = users().in_schema("auth");
        assert_eq!(table.delete_all_query().sql(), r#"DELETE FROM "auth"."users""#);
    }
}
