//! PostgreSQL pool for the local user store.
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Postgres;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "authgate";
pub const DEFAULT_POOL_SIZE: u32 = 10;
/// Seconds to wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: u64 = 3;

fn url(config: &Postgres) -> String {
    let username = config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
    let password = config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
    let db = config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

    format!("postgres://{username}:{password}@{}/{db}", config.address)
}

fn options(config: &Postgres) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
        .acquire_timeout(Duration::from_secs(
            config.acquire_timeout.unwrap_or(DEFAULT_ACQUIRE_TIMEOUT),
        ))
}

/// Init database connections.
pub async fn connect(config: &Postgres) -> Result<PgPool, sqlx::Error> {
    let postgres = options(config).connect(&url(config)).await?;

    tracing::info!(hostname = %config.address, "postgres connected");

    Ok(postgres)
}

/// Build a pool that opens connections on first use.
///
/// An unreachable server then fails the lookup that needed it instead of
/// the caller building the pool.
pub fn connect_lazy(config: &Postgres) -> Result<PgPool, sqlx::Error> {
    options(config).connect_lazy(&url(config))
}

/// Execute migrations scripts.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!().run(pool).await
}
