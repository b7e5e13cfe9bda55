//! Job queue facade over a [`JobStore`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::types::JobId;
use siteaudit_database::JobStore;
use siteaudit_entity::job::{CreateJob, Job, JobPayload, JobStatus};

/// A claimed job with its payload decoded.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    /// The job row as claimed.
    pub job: Job,
    /// Decoded payload.
    pub payload: JobPayload,
}

impl ClaimedJob {
    /// Whether a failure now would exhaust the job.
    pub fn is_final_attempt(&self) -> bool {
        self.job.attempts_exhausted()
    }
}

/// Job queue for enqueuing, claiming and settling work.
#[derive(Debug, Clone)]
pub struct JobQueue {
    /// Backing store.
    store: Arc<dyn JobStore>,
    /// Reclaim protection granted to each claim.
    lock_duration: Duration,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(store: Arc<dyn JobStore>, lock_duration: Duration) -> Self {
        Self {
            store,
            lock_duration,
        }
    }

    /// Enqueue a typed payload.
    pub async fn enqueue(&self, payload: &JobPayload, max_attempts: i32) -> AppResult<Job> {
        let data = CreateJob::from_payload(payload, max_attempts)?;
        self.store.enqueue(&data).await
    }

    /// Claim the next eligible job and decode its payload.
    ///
    /// A job whose payload does not decode is failed through the normal
    /// retry path and reported as a serialization error.
    pub async fn claim_next(&self) -> AppResult<Option<ClaimedJob>> {
        let Some(job) = self.store.claim_next(self.lock_duration).await? else {
            return Ok(None);
        };

        match job.decode_payload() {
            Ok(payload) => {
                debug!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    "Job claimed"
                );
                Ok(Some(ClaimedJob { job, payload }))
            }
            Err(err) => {
                error!(job_id = %job.id, job_type = %job.job_type, error = %err, "Undecodable job payload");
                self.store.fail(job.id, &err.message).await?;
                Err(AppError::serialization(format!(
                    "Job {} has a malformed payload: {}",
                    job.id, err.message
                )))
            }
        }
    }

    /// Mark a job as completed.
    pub async fn complete(&self, id: JobId) -> AppResult<()> {
        self.store.complete(id).await?;
        debug!(job_id = %id, "Job completed");
        Ok(())
    }

    /// Record a failed attempt; returns whether the job will be retried.
    pub async fn fail(&self, id: JobId, error: &str) -> AppResult<JobStatus> {
        let status = self.store.fail(id, error).await?;
        debug!(job_id = %id, status = %status, error, "Job attempt failed");
        Ok(status)
    }

    /// Fail a job for good, skipping any attempts it has left.
    pub async fn abandon(&self, id: JobId, error: &str) -> AppResult<()> {
        self.store.abandon(id, error).await?;
        debug!(job_id = %id, error, "Job abandoned");
        Ok(())
    }
}
