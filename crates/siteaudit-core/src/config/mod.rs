//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every section carries defaults so a missing file still
//! yields a usable configuration.

pub mod app;
pub mod database;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::database::{DatabaseBackend, DatabaseConfig};
pub use self::fetch::{AnalyzerConfig, FetchConfig};
pub use self::logging::{LogFormat, LoggingConfig};
pub use self::pipeline::PipelineConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "SITEAUDIT";

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (base file + environment overlay + env vars).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Audit pipeline defaults.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Sitemap and page fetching settings.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Content analyzer settings.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges `config_path` with an optional `config/{env}` overlay and
    /// environment variables prefixed with `SITEAUDIT__`
    /// (e.g. `SITEAUDIT__WORKER__WORKER_COUNT=8`).
    pub fn load(config_path: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the queue cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker.enabled && self.worker.worker_count == 0 {
            return Err(AppError::configuration(
                "worker.worker_count must be at least 1 when workers are enabled",
            ));
        }
        if self.worker.max_attempts < 1 {
            return Err(AppError::configuration("worker.max_attempts must be at least 1"));
        }
        if self.worker.lock_duration_seconds == 0 {
            return Err(AppError::configuration(
                "worker.lock_duration_seconds must be positive",
            ));
        }
        if self.pipeline.default_rate_limit_ms < 0 {
            return Err(AppError::configuration(
                "pipeline.default_rate_limit_ms must not be negative",
            ));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::configuration(
                "database.min_connections exceeds database.max_connections",
            ));
        }
        Ok(())
    }
}
