//! Platform database pool setup.

use anyhow::Result;
use formgate_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub async fn setup_platform_pool(config: &Config) -> Result<PgPool> {
    tracing::info!("Connecting to platform database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .min_connections(config.db_min_connections())
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(30 * 60))
        .max_lifetime(Duration::from_secs(3600))
        .connect(config.platform_database_url())
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Platform database connected"
    );
    Ok(pool)
}
