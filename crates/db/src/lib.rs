//! Postgres persistence for machines and sensor logs.
//!
//! Repositories are thin query wrappers returning `sqlx::Error`;
//! [`store::PgTelemetryStore`] adapts them to the engine's telemetry ports.

pub mod models;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use store::PgTelemetryStore;

pub type DbPool = sqlx::PgPool;

/// Default pool size when `DB_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Create a connection pool from a database URL.
///
/// Pool size comes from `DB_MAX_CONNECTIONS` (default 20).
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let max_connections = std::env::var("DB_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CONNECTIONS);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    tracing::debug!(max_connections, "Database pool created");
    Ok(pool)
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
