//! Error types for pgscope.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Variants carry actionable messages, and connection-level variants carry a suggestion
//! for how to recover.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum DbError {
    #[error("Pool creation failed: {message}")]
    PoolCreation { message: String, suggestion: String },

    #[error("Session commit failed: {message}")]
    SessionCommit { message: String },

    #[error("Session rollback failed: {message}")]
    SessionRollback { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Schema error: {message} (object: {object})")]
    Schema { message: String, object: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a pool creation error with a helpful suggestion.
    pub fn pool_creation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::PoolCreation {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a session commit error.
    pub fn session_commit(message: impl Into<String>) -> Self {
        Self::SessionCommit {
            message: message.into(),
        }
    }

    /// Create a session rollback error.
    pub fn session_rollback(message: impl Into<String>) -> Self {
        Self::SessionRollback {
            message: message.into(),
        }
    }

    /// Create a session misuse error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a schema error.
    pub fn schema(message: impl Into<String>, object: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            object: object.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::PoolCreation { suggestion, .. } => Some(suggestion),
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// A failed pool creation leaves the manager empty, so calling
    /// `acquire_pool` again starts a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PoolCreation { .. } | Self::Connection { .. } | Self::Timeout { .. }
        )
    }

    /// Re-wrap any error as a pool creation failure, keeping an existing one as is.
    pub(crate) fn into_pool_creation(self) -> Self {
        match self {
            err @ Self::PoolCreation { .. } => err,
            other => {
                let suggestion = other
                    .suggestion()
                    .unwrap_or("Check the database URL and that the server is reachable")
                    .to_string();
                Self::PoolCreation {
                    message: other.to_string(),
                    suggestion,
                }
            }
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                let suggestion = match code.as_deref() {
                    // datatype_mismatch, undefined_function
                    Some("42804" | "42883") => {
                        "Declare the column's SQL type with Table::with_column_type so bound values are cast"
                    }
                    _ => "Check the SQL syntax and referenced objects",
                };
                DbError::database(db_err.message(), code, suggestion)
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Acquire the pool again")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => DbError::schema(
                format!("Type not found: {}", type_name),
                type_name.to_string(),
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::schema(format!("Column not found: {}", col), col.to_string())
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::serialization(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
