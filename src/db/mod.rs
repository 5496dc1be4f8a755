//! Database layer.
//!
//! - Lazy shared pool construction and teardown
//! - Reentrant transactional session scopes
//! - Query execution with timeouts
//! - Parameter binding and row decoding

pub mod executor;
pub mod params;
pub mod pool;
pub mod session;
pub mod types;

pub use executor::QueryExecutor;
pub use pool::{LazyPoolManager, PgConnector, PoolConnector, PoolStatus};
pub use session::{PgSession, PgSessionFactory, Session, SessionFactory, SessionScope};
pub use types::RowToJson;
