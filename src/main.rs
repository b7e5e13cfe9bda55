//! SiteAudit server: HTTP API, worker pool and reconciler in one process.

use tracing_subscriber::{EnvFilter, fmt};

use siteaudit_api::{Application, Collaborators, Stores, shutdown_signal};
use siteaudit_core::config::{AppConfig, LogFormat};
use siteaudit_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("SITEAUDIT_CONFIG").unwrap_or_else(|_| "config/default".to_string());
    let env = std::env::var("SITEAUDIT_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&config_path, &env)
}

/// Initialize tracing. `RUST_LOG` wins over the configured directives.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.filter_directives()));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_current_span(false)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.database.backend,
        workers = config.worker.worker_count,
        "Starting SiteAudit"
    );

    let stores = Stores::open(&config.database).await?;
    let collaborators = Collaborators::from_config(&config)?;
    let app = Application::build(config, stores, collaborators);

    app.run(shutdown_signal()).await
}
