//! The PostgreSQL pool shared by the job and audit repositories.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use siteaudit_core::config::DatabaseConfig;
use siteaudit_core::error::{AppError, ErrorKind};

use crate::migration::run_migrations;

/// A sqlx `PgPool` opened from [`DatabaseConfig`].
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open a pool from configuration and, when enabled, apply migrations.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let masked = mask_password(&config.url);
        info!(
            url = %masked,
            max_connections = config.max_connections,
            "Opening job store pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Cannot reach job store at {masked}: {e}"),
                    e,
                )
            })?;

        if config.run_migrations {
            run_migrations(&pool).await?;
        }

        info!(url = %masked, "Job store ready");
        Ok(Self { pool })
    }

    /// The underlying sqlx pool, cloned into each repository.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query; backs `GET /api/health`.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Job store did not answer", e))
    }

    /// Close the pool once the workers have drained.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Job store pool closed");
    }
}

/// Mask the password portion of a database URL for safe logging.
fn mask_password(url: &str) -> String {
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url.rfind('@') {
        Some(at_pos) if at_pos > scheme_end => match url[scheme_end..at_pos].find(':') {
            Some(rel) => {
                let colon_pos = scheme_end + rel;
                format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..])
            }
            None => url.to_string(),
        },
        _ => url.to_string(),
    }
}
