//! Worker pool: independent loops that claim, execute and settle jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

use siteaudit_core::config::WorkerConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::types::AuditId;
use siteaudit_entity::job::{JobPayload, JobStatus};

use crate::executor::{JobExecutionError, JobExecutor};
use crate::gate::{CrawlGate, CrawlPermit};
use crate::queue::{ClaimedJob, JobQueue};

/// Message recorded on a job released because its worker is stopping.
const SHUTDOWN_ERROR: &str = "Worker shut down before the job started";

/// Outcome of one claim-and-process step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The queue had nothing eligible.
    Idle,
    /// A job was claimed and settled.
    Processed,
    /// A job was claimed but released because shutdown was requested.
    Released,
}

/// Runs `worker_count` loops over one queue, executor and crawl gate.
#[derive(Debug)]
pub struct WorkerPool {
    /// Job queue for claiming.
    queue: Arc<JobQueue>,
    /// Job executor for dispatching.
    executor: Arc<JobExecutor>,
    /// Per-audit crawl admission.
    gate: Arc<dyn CrawlGate>,
    /// Worker configuration.
    config: WorkerConfig,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(
        queue: Arc<JobQueue>,
        executor: Arc<JobExecutor>,
        gate: Arc<dyn CrawlGate>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            executor,
            gate,
            config,
        }
    }

    /// Run every worker loop until the cancel signal is received, then wait
    /// for the loops to finish their current job.
    pub async fn run(self: Arc<Self>, cancel: watch::Receiver<bool>) {
        let count = self.config.worker_count.max(1);
        info!(
            workers = count,
            poll_interval_ms = self.config.poll_interval_ms,
            lock_duration_seconds = self.config.lock_duration_seconds,
            "Worker pool started"
        );

        let mut handles = Vec::with_capacity(count);
        for worker_id in 0..count {
            let pool = Arc::clone(&self);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id, cancel).await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker loop ended abnormally");
            }
        }
        info!("Worker pool shut down complete");
    }

    /// One worker loop: claim → process → settle → claim.
    async fn worker_loop(&self, worker_id: usize, mut cancel: watch::Receiver<bool>) {
        debug!(worker_id, "Worker started");
        let mut consecutive_errors: u32 = 0;

        loop {
            if *cancel.borrow() {
                break;
            }

            let pause = match self.step(worker_id, &mut cancel).await {
                Ok(StepOutcome::Processed) => {
                    consecutive_errors = 0;
                    None
                }
                Ok(StepOutcome::Idle) => {
                    consecutive_errors = 0;
                    Some(self.config.poll_interval())
                }
                Ok(StepOutcome::Released) => break,
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= self.config.error_log_threshold {
                        error!(
                            worker_id,
                            consecutive_errors,
                            error = %e,
                            "Worker cannot reach the job store"
                        );
                    } else {
                        debug!(worker_id, consecutive_errors, error = %e, "Worker step failed");
                    }
                    Some(self.config.error_backoff())
                }
            };

            if let Some(pause) = pause {
                if !sleep_unless_cancelled(pause, &mut cancel).await {
                    break;
                }
            }
        }

        debug!(worker_id, "Worker stopped");
    }

    /// Claim one job and run it to completion.
    ///
    /// Errors are store failures around the claim or the settle; failures
    /// inside the job are recorded on the job instead.
    pub async fn step(
        &self,
        worker_id: usize,
        cancel: &mut watch::Receiver<bool>,
    ) -> AppResult<StepOutcome> {
        let Some(job) = self.queue.claim_next().await? else {
            return Ok(StepOutcome::Idle);
        };

        let permit = match &job.payload {
            JobPayload::CrawlPage(p) => match self.wait_for_gate(p.audit_id, cancel).await {
                Some(permit) => Some(permit),
                None => {
                    let status = self.queue.fail(job.job.id, SHUTDOWN_ERROR).await?;
                    if status == JobStatus::Failed {
                        self.after_exhausted(worker_id, &job).await;
                    }
                    return Ok(StepOutcome::Released);
                }
            },
            JobPayload::AnalyzePage(_) => None,
        };

        let result = self.execute_isolated(job.clone()).await;
        drop(permit);

        self.settle(worker_id, &job, result).await?;
        Ok(StepOutcome::Processed)
    }

    async fn wait_for_gate(
        &self,
        audit_id: AuditId,
        cancel: &mut watch::Receiver<bool>,
    ) -> Option<CrawlPermit> {
        let poll = self.config.crawl_gate_poll();
        tokio::select! {
            permit = self.gate.acquire(audit_id, poll) => Some(permit),
            _ = wait_for_cancel(cancel) => None,
        }
    }

    /// Run the handler on its own task so a panic fails the job instead of
    /// killing the loop.
    async fn execute_isolated(&self, job: ClaimedJob) -> Result<(), JobExecutionError> {
        let executor = Arc::clone(&self.executor);
        let handle = tokio::spawn(async move { executor.execute(&job).await });
        match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(JobExecutionError::Internal(AppError::internal(format!(
                "Job handler panicked: {join_err}"
            )))),
        }
    }

    async fn settle(
        &self,
        worker_id: usize,
        job: &ClaimedJob,
        result: Result<(), JobExecutionError>,
    ) -> AppResult<()> {
        let job_id = job.job.id;
        let job_type = job.job.job_type;

        let err = match result {
            Ok(()) => {
                self.queue.complete(job_id).await?;
                debug!(worker_id, job_id = %job_id, job_type = %job_type, "Job succeeded");
                return Ok(());
            }
            Err(err) => err,
        };

        let message = err.to_string();
        let status = match err {
            JobExecutionError::Permanent(_) => {
                self.queue.abandon(job_id, &message).await?;
                JobStatus::Failed
            }
            JobExecutionError::Transient(_) | JobExecutionError::Internal(_) => {
                self.queue.fail(job_id, &message).await?
            }
        };
        if status == JobStatus::Failed {
            error!(
                worker_id,
                job_id = %job_id,
                job_type = %job_type,
                attempts = job.job.attempts,
                error = %message,
                "Job failed permanently"
            );
            self.after_exhausted(worker_id, job).await;
        } else {
            warn!(
                worker_id,
                job_id = %job_id,
                job_type = %job_type,
                attempt = job.job.attempts,
                max_attempts = job.job.max_attempts,
                error = %message,
                "Job attempt failed, will retry"
            );
        }
        Ok(())
    }

    /// Run the handler's exhaustion hook. The job is already settled, so a
    /// hook error is only logged.
    async fn after_exhausted(&self, worker_id: usize, job: &ClaimedJob) {
        if let Err(e) = self.executor.on_exhausted(job).await {
            warn!(worker_id, job_id = %job.job.id, error = %e, "Exhaustion hook failed");
        }
    }
}

/// Sleep for `duration`; returns false if cancellation arrived first.
async fn sleep_unless_cancelled(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = time::sleep(duration) => true,
        _ = wait_for_cancel(cancel) => false,
    }
}

/// Resolves once the cancel flag is set or its sender is gone.
async fn wait_for_cancel(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
