//! pgscope
//!
//! PostgreSQL data access on top of sqlx: a lazily created shared pool, reentrant
//! transactional session scopes, and CRUD statements built from table metadata.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;

pub use config::Config;
pub use db::{LazyPoolManager, SessionScope};
pub use error::{DbError, DbResult};
