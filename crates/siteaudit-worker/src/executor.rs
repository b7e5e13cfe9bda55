//! Job executor: dispatches claimed jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_entity::job::JobType;

use crate::queue::ClaimedJob;

/// Trait for job handler implementations.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// The job type this handler processes.
    fn job_type(&self) -> JobType;

    /// Execute the job. Any error fails the current attempt.
    async fn execute(&self, job: &ClaimedJob) -> Result<(), JobExecutionError>;

    /// Called once the job has been failed with no retry to come.
    async fn on_exhausted(&self, _job: &ClaimedJob) -> AppResult<()> {
        Ok(())
    }
}

/// Error from job execution.
///
/// `Permanent` fails the job at once; the other variants fail the attempt
/// and leave any remaining attempts to the retry.
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The job can never succeed as queued.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// A collaborator failed; another attempt may succeed.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches jobs to the handler registered for their type.
#[derive(Debug, Default)]
pub struct JobExecutor {
    /// Registered job handlers by type.
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    /// Create an executor with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job handler, replacing any previous one for its type.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type();
        info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Execute a job by dispatching to the correct handler.
    pub async fn execute(&self, job: &ClaimedJob) -> Result<(), JobExecutionError> {
        let job_type = job.payload.job_type();
        let handler = self.handlers.get(&job_type).ok_or_else(|| {
            JobExecutionError::Permanent(format!("No handler registered for job type '{job_type}'"))
        })?;
        handler.execute(job).await
    }

    /// Let the job's handler react to the job failing for good.
    pub async fn on_exhausted(&self, job: &ClaimedJob) -> AppResult<()> {
        match self.handlers.get(&job.payload.job_type()) {
            Some(handler) => handler.on_exhausted(job).await,
            None => Ok(()),
        }
    }

    /// Check if a handler is registered for a job type.
    pub fn has_handler(&self, job_type: JobType) -> bool {
        self.handlers.contains_key(&job_type)
    }
}
