//! Migrate command - applies pending PostgreSQL migrations and exits

use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging;
use crate::infrastructure::storage::{connect_pool, run_migrations, PostgresMigrator};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    let pool = connect_pool(&crate::postgres_config(&config.database)).await?;

    run_migrations(&pool).await?;

    let version = PostgresMigrator::new(pool.clone()).current_version().await?;
    info!(version = ?version, "Database schema is up to date");

    pool.close().await;

    Ok(())
}
