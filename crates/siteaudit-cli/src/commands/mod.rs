//! CLI command definitions and dispatch.

pub mod audit;
pub mod migrate;
pub mod worker;

use clap::{Parser, Subcommand};

use siteaudit_api::Stores;
use siteaudit_core::config::{AppConfig, DatabaseBackend};
use siteaudit_core::error::AppError;

use crate::output::{self, OutputFormat};

/// SiteAudit: sitemap content quality audits
#[derive(Debug, Parser)]
#[command(name = "siteaudit", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Configuration overlay loaded from `config/{env}`
    #[arg(short, long, env = "SITEAUDIT_ENV", default_value = "development")]
    pub env: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Audit management
    Audit(audit::AuditArgs),
    /// Worker pool and queue
    Worker(worker::WorkerArgs),
    /// Apply database migrations
    Migrate,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = AppConfig::load(&self.config, &self.env)?;
        match &self.command {
            Commands::Audit(args) => audit::execute(args, config, self.format).await,
            Commands::Worker(args) => worker::execute(args, config, self.format).await,
            Commands::Migrate => migrate::execute(config).await,
        }
    }
}

/// Helper: open the configured stores, warning when they are process-local
pub async fn open_stores(config: &AppConfig) -> Result<Stores, AppError> {
    if config.database.backend == DatabaseBackend::Memory {
        output::print_error(
            "database.backend is \"memory\"; this command sees only its own process state",
        );
    }
    Stores::open(&config.database).await
}
