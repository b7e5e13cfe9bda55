//! Database migration command.

use siteaudit_core::config::{AppConfig, DatabaseBackend};
use siteaudit_core::error::AppError;
use siteaudit_database::DatabasePool;
use siteaudit_database::migration::run_migrations;

use crate::output;

/// Apply every pending migration
pub async fn execute(mut config: AppConfig) -> Result<(), AppError> {
    if config.database.backend != DatabaseBackend::Postgres {
        return Err(AppError::configuration(
            "Migrations apply only to the postgres backend",
        ));
    }

    config.database.run_migrations = false;
    let pool = DatabasePool::connect(&config.database).await?;
    println!("Running database migrations...");
    run_migrations(pool.pool()).await?;
    pool.close().await;
    output::print_success("All migrations applied successfully.");
    Ok(())
}
