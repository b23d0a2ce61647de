//! Database initialization and migration runner.
//!
//! SYSTEM CONTEXT
//! ==============
//! The headless client uses this module to open the SQLx pool behind
//! `PgElementStore` and to bring the `board_elements` schema up to date
//! before any board is opened.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::env_parse;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Initialize the `PostgreSQL` connection pool and run migrations.
///
/// # Errors
///
/// Returns an error if the connection or migrations fail.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let max_connections = env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
    let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;

    sqlx::migrate!("src/db/migrations").run(&pool).await?;
    tracing::info!(max_connections, "database ready");

    Ok(pool)
}
