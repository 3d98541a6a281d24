//! Database connection management

use crate::config::DatabaseSettings;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::time::Duration;
use tracing::info;

/// Database pings must answer within this window or the service reports
/// itself degraded.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Create a new database connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> std::result::Result<PgPool, sqlx::Error> {
    info!(
        host = %settings.host,
        port = settings.port,
        dbname = %settings.dbname,
        max_open = settings.max_open_conns,
        max_idle = settings.max_idle_conns,
        "creating database connection pool"
    );

    let ssl_mode = settings
        .sslmode
        .parse::<PgSslMode>()
        .unwrap_or(PgSslMode::Prefer);

    let options = PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(&settings.password)
        .database(&settings.dbname)
        .ssl_mode(ssl_mode)
        .options([("search_path", settings.search_path.as_str())]);

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_open_conns)
        .min_connections(settings.max_idle_conns.min(settings.max_open_conns))
        .max_lifetime(Some(settings.conn_max_lifetime()))
        .connect_with(options)
        .await?;

    info!("database connection pool created");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    info!("running database migrations");

    sqlx::migrate!("./migrations").run(pool).await?;

    info!("database migrations completed");
    Ok(())
}

/// Verify the database answers within the health timeout.
pub async fn health_check(pool: &PgPool) -> Result<()> {
    let ping = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool);

    match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, ping).await {
        Ok(Ok(1)) => Ok(()),
        Ok(Ok(n)) => Err(DomainError::Database(format!(
            "health check returned unexpected value: {}",
            n
        ))),
        Ok(Err(e)) => Err(DomainError::Database(e.to_string())),
        Err(_) => Err(DomainError::Database("health check timed out".to_string())),
    }
}
