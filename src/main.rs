//! pgscope - Main entry point.
//!
//! Checks a PostgreSQL target end to end: creates the shared pool, reports the
//! server version, runs a probe inside a transactional scope, then releases the pool.

use clap::Parser;
use pgscope::config::Config;
use pgscope::db::{LazyPoolManager, PgConnector, PgSessionFactory, QueryExecutor, SessionScope};
use pgscope::error::{DbError, DbResult};
use pgscope::query::compile;
use sqlx::Row;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

async fn check(config: &Config, manager: &LazyPoolManager<PgConnector>) -> DbResult<()> {
    let executor = QueryExecutor::with_timeout(config.query_timeout_duration());
    let pool = manager.acquire_pool().await?;

    let version_query = compile("SELECT version() AS version");
    let version: String = match executor.fetch_optional(&pool, &version_query, &[]).await? {
        Some(row) => row.try_get("version")?,
        None => return Err(DbError::internal("version() returned no row")),
    };
    info!(server_version = %version, "Connected");

    let factory =
        PgSessionFactory::from_pool(pool).with_query_timeout(config.query_timeout_duration());
    let mut scope = SessionScope::new(factory);
    let database = scope
        .scoped(async |scope| {
            let probe = compile("SELECT current_database()::text AS database");
            let row = scope.session()?.fetch_optional(&probe, &[]).await?;
            let database: Option<String> = match row {
                Some(row) => row.try_get("database")?,
                None => None,
            };
            Ok::<_, DbError>(database)
        })
        .await?;
    info!(
        database = database.as_deref().unwrap_or("<unknown>"),
        "Transactional probe committed"
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    let db_config = config.database()?;
    info!(
        target_url = %db_config.redacted(),
        database = db_config.database.as_deref().unwrap_or("<default>"),
        "Starting pgscope v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = LazyPoolManager::from_config(&db_config);
    let result = check(&config, &manager).await;
    manager.release_pool().await;

    if let Err(e) = result {
        error!(
            error = %e,
            suggestion = e.suggestion().unwrap_or_default(),
            "Check failed"
        );
        return Err(e.into());
    }

    info!("Check complete");
    Ok(())
}
