//! Database Module
//!
//! PostgreSQL connection pool and schema migrations for the durable
//! side of the counters pipeline.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, instrument};

use crate::config::DatabaseSettings;

/// Create a PostgreSQL connection pool
#[instrument(skip(settings))]
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await?;
    info!("PostgreSQL connection pool ready");
    Ok(pool)
}

/// Run database migrations (likes, event_members, counters, applied_counter_events)
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
