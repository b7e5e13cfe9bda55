//! Worker pool and queue commands.

use clap::{Args, Subcommand};

use siteaudit_api::{Application, Collaborators, shutdown_signal};
use siteaudit_core::config::AppConfig;
use siteaudit_core::error::AppError;
use siteaudit_service::QueueService;

use crate::output::{self, OutputFormat};

/// Arguments for worker commands
#[derive(Debug, Args)]
pub struct WorkerArgs {
    /// Worker subcommand
    #[command(subcommand)]
    pub command: WorkerCommand,
}

/// Worker subcommands
#[derive(Debug, Subcommand)]
pub enum WorkerCommand {
    /// Show job queue counts
    Status,
    /// Run the worker pool and reconciler without the HTTP API
    Run {
        /// Override the configured number of worker loops
        #[arg(short, long)]
        workers: Option<usize>,
    },
}

/// Execute worker commands
pub async fn execute(
    args: &WorkerArgs,
    mut config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let stores = super::open_stores(&config).await?;

    match &args.command {
        WorkerCommand::Status => {
            let stats = QueueService::new(stores.jobs.clone()).stats().await?;
            match format {
                OutputFormat::Json => output::print_json(&stats),
                OutputFormat::Table => {
                    println!("Job Queue Status:");
                    output::print_kv("Pending", &stats.pending.to_string());
                    output::print_kv("Processing", &stats.processing.to_string());
                    output::print_kv("Completed", &stats.completed.to_string());
                    output::print_kv("Failed", &stats.failed.to_string());
                    output::print_kv("Worker Count", &config.worker.worker_count.to_string());
                }
            }
        }
        WorkerCommand::Run { workers } => {
            if let Some(count) = workers {
                config.worker.worker_count = *count;
            }
            config.server.enabled = false;
            config.worker.enabled = true;

            let collaborators = Collaborators::from_config(&config)?;
            let app = Application::build(config, stores, collaborators);
            app.run(shutdown_signal()).await?;
        }
    }

    Ok(())
}
