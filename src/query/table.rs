//! Table metadata used by the query builder.

use crate::error::{DbError, DbResult};
use crate::query::builder::INSTANCE_ID_PARAM;
use std::collections::BTreeMap;

/// Column name used as the primary key when none is given.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Name, columns and primary key of a relational table.
///
/// Column names double as bind parameter names in generated statements, so
/// they must be plain identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
///
/// String values are sent as TEXT. A column of another type that is written
/// from strings (`uuid`, `timestamptz`, `date`, `numeric`, ...) needs its SQL
/// type declared with [`Table::with_column_type`]; the builder then casts the
/// bound value to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    schema: Option<String>,
    name: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    column_types: BTreeMap<String, String>,
}

impl Table {
    /// Create a table keyed on the `id` column.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_primary_key(name, columns, [DEFAULT_PRIMARY_KEY])
    }

    /// Create a table with an explicit (possibly composite) primary key.
    pub fn with_primary_key<I, S, K, T>(
        name: impl Into<String>,
        columns: I,
        primary_key: K,
    ) -> DbResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        K: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let table = Self {
            schema: None,
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            primary_key: primary_key.into_iter().map(Into::into).collect(),
            column_types: BTreeMap::new(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Place the table in a schema other than the search path default.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Declare the SQL type of `column`, e.g. `uuid` or `numeric(12,2)`.
    pub fn with_column_type(
        mut self,
        column: impl Into<String>,
        sql_type: impl Into<String>,
    ) -> DbResult<Self> {
        let column = column.into();
        let sql_type = sql_type.into().trim().to_string();
        if !self.columns.contains(&column) {
            return Err(DbError::schema(
                format!("Cannot type unknown column '{}'", column),
                &self.name,
            ));
        }
        if !is_type_name(&sql_type) {
            return Err(DbError::schema(
                format!("Invalid SQL type '{}' for column '{}'", sql_type, column),
                &self.name,
            ));
        }
        self.column_types.insert(column, sql_type);
        Ok(self)
    }

    /// The declared SQL type of `column`, if any.
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// True when the key is a single column.
    pub fn has_simple_key(&self) -> bool {
        self.primary_key.len() == 1
    }

    /// Columns that are not part of the primary key, in declaration order.
    pub fn non_key_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !self.primary_key.contains(c))
            .map(String::as_str)
    }

    /// The quoted, optionally schema-qualified table name.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.name)),
            None => quote_ident(&self.name),
        }
    }

    fn validate(&self) -> DbResult<()> {
        if self.name.trim().is_empty() {
            return Err(DbError::invalid_input("Table name cannot be empty"));
        }
        if self.columns.is_empty() {
            return Err(DbError::schema("Table has no columns", &self.name));
        }
        for (idx, column) in self.columns.iter().enumerate() {
            if !is_bind_identifier(column) {
                return Err(DbError::schema(
                    format!("Column name '{}' is not a plain identifier", column),
                    &self.name,
                ));
            }
            if self.columns[..idx].contains(column) {
                return Err(DbError::schema(
                    format!("Duplicate column '{}'", column),
                    &self.name,
                ));
            }
        }
        if self.primary_key.is_empty() {
            return Err(DbError::schema("Primary key cannot be empty", &self.name));
        }
        for key in &self.primary_key {
            if !self.columns.contains(key) {
                return Err(DbError::schema(
                    format!("Primary key column '{}' is not a table column", key),
                    &self.name,
                ));
            }
        }
        // A single key binds as :instance_id, so no other column may use that name.
        if self.has_simple_key()
            && self.primary_key[0] != INSTANCE_ID_PARAM
            && self.columns.iter().any(|c| c == INSTANCE_ID_PARAM)
        {
            return Err(DbError::schema(
                format!(
                    "Column '{}' collides with the key bind name; make it the primary key or rename it",
                    INSTANCE_ID_PARAM
                ),
                &self.name,
            ));
        }
        Ok(())
    }
}

/// Quote an identifier for PostgreSQL, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn is_bind_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Accepts spellings like `uuid`, `timestamp with time zone`,
/// `numeric(12, 2)`, `text[]` and `public.citext`.
fn is_type_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || " _.,()[]".contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_primary_key() {
        let table = Table::new("users", ["id", "name", "email"]).unwrap();
        assert_eq!(table.primary_key(), ["id"]);
        assert!(table.has_simple_key());
        assert_eq!(table.non_key_columns().collect::<Vec<_>>(), ["name", "email"]);
    }

    #[test]
    fn test_composite_primary_key() {
        let table =
            Table::with_primary_key("registrations", ["user_id", "event_id", "note"], [
                "user_id", "event_id",
            ])
            .unwrap();
        assert!(!table.has_simple_key());
        assert_eq!(table.non_key_columns().collect::<Vec<_>>(), ["note"]);
    }

    #[test]
    fn test_missing_id_column_rejected() {
        let err = Table::new("users", ["user_id", "name"]).unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
        assert!(err.to_string().contains("'id'"));
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(Table::new("", ["id"]).is_err());
        assert!(Table::new("t", Vec::<String>::new()).is_err());
        assert!(Table::new("t", ["id", "id"]).is_err());
        assert!(Table::new("t", ["id", "first name"]).is_err());
        assert!(Table::new("t", ["id", "1st"]).is_err());
        assert!(Table::with_primary_key("t", ["id"], Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_qualified_name() {
        let table = Table::new("users", ["id"]).unwrap();
        assert_eq!(table.qualified_name(), "\"users\"");

        let table = table.in_schema("auth");
        assert_eq!(table.schema(), Some("auth"));
        assert_eq!(table.qualified_name(), "\"auth\".\"users\"");
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_column_types() {
        let table = Table::new("docs", ["id", "title", "created_at"])
            .unwrap()
            .with_column_type("id", "uuid")
            .unwrap()
            .with_column_type("created_at", " timestamp with time zone ")
            .unwrap();
        assert_eq!(table.column_type("id"), Some("uuid"));
        assert_eq!(table.column_type("created_at"), Some("timestamp with time zone"));
        assert_eq!(table.column_type("title"), None);

        assert!(table.clone().with_column_type("missing", "uuid").is_err());
        assert!(table.clone().with_column_type("title", "").is_err());
        assert!(table.clone().with_column_type("title", "text; DROP TABLE docs").is_err());
        assert!(table.clone().with_column_type("title", "text::int").is_err());
        assert!(table.with_column_type("title", "numeric(12, 2)[]").is_ok());
    }

    #[test]
    fn test_instance_id_column_beside_simple_key_rejected() {
        let err = Table::new("aliases", ["id", "instance_id"]).unwrap_err();
        assert!(matches!(err, DbError::Schema { .. }));
        assert!(err.to_string().contains("instance_id"));

        // Allowed when it is the key itself, or when the key is composite.
        assert!(Table::with_primary_key("a", ["instance_id", "v"], ["instance_id"]).is_ok());
        assert!(
            Table::with_primary_key("b", ["id", "instance_id"], ["id", "instance_id"]).is_ok()
        );
    }

    #[test]
    fn test_is_bind_identifier() {
        assert!(is_bind_identifier("_private"));
        assert!(is_bind_identifier("col_2"));
        assert!(!is_bind_identifier(""));
        assert!(!is_bind_identifier("2col"));
        assert!(!is_bind_identifier("col-name"));
    }
}
