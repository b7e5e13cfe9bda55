//! Application builder: wires stores, collaborators, services, workers and
//! the router into one runnable unit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use siteaudit_core::config::{AppConfig, DatabaseBackend, DatabaseConfig};
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalyzer, ContentFetcher, SitemapResolver};
use siteaudit_database::repositories::{AuditRepository, JobRepository};
use siteaudit_database::{AuditStore, DatabasePool, JobStore, MemoryStore};
use siteaudit_fetch::{HtmlContentFetcher, HttpSitemapResolver, LlmContentAnalyzer};
use siteaudit_service::{AuditProgression, AuditService, QueueService};
use siteaudit_worker::{
    AnalyzePageHandler, CrawlPageHandler, InMemoryCrawlGate, JobExecutor, JobQueue, Reconciler,
    WorkerPool,
};

use crate::router::build_router;
use crate::state::AppState;

/// The job and audit stores behind one backend.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Job queue persistence.
    pub jobs: Arc<dyn JobStore>,
    /// Audit, page and issue persistence.
    pub audits: Arc<dyn AuditStore>,
    /// PostgreSQL pool when that backend is selected.
    pub pool: Option<DatabasePool>,
}

impl Stores {
    /// Open the configured backend.
    pub async fn open(config: &DatabaseConfig) -> AppResult<Self> {
        match config.backend {
            DatabaseBackend::Postgres => {
                let pool = DatabasePool::connect(config).await?;
                Ok(Self {
                    jobs: Arc::new(JobRepository::new(pool.pool().clone())),
                    audits: Arc::new(AuditRepository::new(pool.pool().clone())),
                    pool: Some(pool),
                })
            }
            DatabaseBackend::Memory => {
                warn!("Using the in-memory store; audits are lost on restart");
                Ok(Self::memory(Arc::new(MemoryStore::new())))
            }
        }
    }

    /// Both stores backed by one [`MemoryStore`].
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            jobs: store.clone(),
            audits: store,
            pool: None,
        }
    }
}

/// The network collaborators used by the pipeline.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Sitemap resolution.
    pub resolver: Arc<dyn SitemapResolver>,
    /// Page download and text extraction.
    pub fetcher: Arc<dyn ContentFetcher>,
    /// Content scoring.
    pub analyzer: Arc<dyn ContentAnalyzer>,
}

impl Collaborators {
    /// The HTTP implementations built from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            resolver: Arc::new(HttpSitemapResolver::new(&config.fetch)?),
            fetcher: Arc::new(HtmlContentFetcher::new(&config.fetch)?),
            analyzer: Arc::new(LlmContentAnalyzer::new(config.analyzer.clone())?),
        })
    }
}

/// A fully wired SiteAudit process.
#[derive(Debug)]
pub struct Application {
    /// Loaded configuration.
    config: AppConfig,
    /// Handler state.
    state: AppState,
    /// Worker loops.
    workers: Arc<WorkerPool>,
    /// Orphan and stranded page repair.
    reconciler: Arc<Reconciler>,
}

impl Application {
    /// Wire every component over the given stores and collaborators.
    pub fn build(config: AppConfig, stores: Stores, collaborators: Collaborators) -> Self {
        let max_attempts = config.worker.max_attempts;
        let progression = AuditProgression::new(stores.audits.clone());

        let audit_service = Arc::new(AuditService::new(
            stores.audits.clone(),
            collaborators.resolver,
            config.pipeline.clone(),
            max_attempts,
        ));
        let queue_service = Arc::new(QueueService::new(stores.jobs.clone()));

        let queue = Arc::new(JobQueue::new(
            stores.jobs.clone(),
            config.worker.lock_duration(),
        ));
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(CrawlPageHandler::new(
            progression.clone(),
            collaborators.fetcher,
            max_attempts,
        )));
        executor.register(Arc::new(AnalyzePageHandler::new(
            progression.clone(),
            collaborators.analyzer,
        )));

        let workers = Arc::new(WorkerPool::new(
            queue.clone(),
            Arc::new(executor),
            Arc::new(InMemoryCrawlGate::new()),
            config.worker.clone(),
        ));
        let reconciler = Arc::new(Reconciler::new(
            stores.audits.clone(),
            queue,
            progression,
            &config.worker,
        ));

        let state = AppState::new(audit_service, queue_service, stores.pool);
        Self {
            config,
            state,
            workers,
            reconciler,
        }
    }

    /// Handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The HTTP router over this application's state.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), &self.config.server)
    }

    /// The worker pool.
    pub fn workers(&self) -> Arc<WorkerPool> {
        Arc::clone(&self.workers)
    }

    /// The reconciler.
    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Run the HTTP server, workers and reconciler until `shutdown`
    /// resolves, then drain the workers.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> AppResult<()> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut background = Vec::new();

        if self.config.worker.enabled {
            let workers = self.workers();
            let cancel = cancel_rx.clone();
            background.push(tokio::spawn(async move { workers.run(cancel).await }));

            let reconciler = self.reconciler();
            let cancel = cancel_rx.clone();
            background.push(tokio::spawn(async move { reconciler.run(cancel).await }));
        } else {
            info!("Workers disabled by configuration");
        }

        if self.config.server.enabled {
            let address = self.config.server.bind_address();
            let listener = TcpListener::bind(&address).await.map_err(|e| {
                AppError::configuration(format!("Failed to bind {address}: {e}"))
            })?;
            info!(address = %address, "HTTP server listening");

            axum::serve(listener, self.router())
                .with_graceful_shutdown(shutdown)
                .await
                .map_err(|e| AppError::internal(format!("HTTP server error: {e}")))?;
        } else {
            shutdown.await;
        }

        info!("Shutdown requested, draining workers");
        let _ = cancel_tx.send(true);

        let timeout = Duration::from_secs(self.config.worker.shutdown_timeout_seconds);
        let drain = async {
            for handle in background {
                if let Err(e) = handle.await {
                    warn!(error = %e, "Background task ended abnormally");
                }
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(
                timeout_seconds = timeout.as_secs(),
                "Workers did not stop in time; their jobs will be reclaimed after lock expiry"
            );
        }

        if let Some(pool) = &self.state.db_pool {
            pool.close().await;
        }
        info!("SiteAudit stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
