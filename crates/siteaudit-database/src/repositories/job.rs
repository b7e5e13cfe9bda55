//! Job repository: the PostgreSQL-backed queue.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::types::JobId;
use siteaudit_entity::job::{CreateJob, Job, JobStatus};

use super::{db_error, insert_job};
use crate::store::JobStore;

/// Message merged into a job whose last claim expired with no attempts left.
pub(crate) const LOCK_EXPIRED_ERROR: &str = "Lock expired on final attempt";

/// Repository for queue operations on the `jobs` table.
#[derive(Debug, Clone)]
pub struct JobRepository {
    pool: PgPool,
}

impl JobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fail Processing jobs whose lock expired on their last allowed claim.
    async fn fail_expired_exhausted(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', processed_at = NOW(), locked_until = NULL, \
             payload = payload || jsonb_build_object('last_error', $1::text) \
             WHERE status = 'processing' AND locked_until <= NOW() AND attempts >= max_attempts",
        )
        .bind(LOCK_EXPIRED_ERROR)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to expire exhausted jobs"))?;
        Ok(result.rows_affected())
    }

    /// Status of a job the caller could not update, or NotFound.
    async fn settled_status(&self, id: JobId) -> AppResult<JobStatus> {
        sqlx::query_scalar::<_, JobStatus>("SELECT status FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find job"))?
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn enqueue(&self, job: &CreateJob) -> AppResult<Job> {
        let job = insert_job(&self.pool, job).await?;
        debug!(job_id = %job.id, job_type = %job.job_type, "Job enqueued");
        Ok(job)
    }

    async fn claim_next(&self, lock_duration: Duration) -> AppResult<Option<Job>> {
        let expired = self.fail_expired_exhausted().await?;
        if expired > 0 {
            warn!(count = expired, "Failed jobs whose final claim expired");
        }

        sqlx::query_as::<_, Job>(
            "UPDATE jobs SET status = 'processing', attempts = attempts + 1, \
             locked_until = NOW() + make_interval(secs => $1) \
             WHERE id = ( \
                SELECT id FROM jobs \
                WHERE (status = 'pending' AND (locked_until IS NULL OR locked_until <= NOW())) \
                   OR (status = 'processing' AND locked_until <= NOW() AND attempts < max_attempts) \
                ORDER BY created_at ASC, seq ASC \
                FOR UPDATE SKIP LOCKED \
                LIMIT 1 \
             ) RETURNING *",
        )
        .bind(lock_duration.as_secs_f64())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to claim job"))
    }

    async fn complete(&self, id: JobId) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', processed_at = NOW(), locked_until = NULL \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to complete job"))?;

        if result.rows_affected() == 0 {
            let status = self.settled_status(id).await?;
            debug!(job_id = %id, status = %status, "Job already settled");
        }
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> AppResult<JobStatus> {
        let status = sqlx::query_scalar::<_, JobStatus>(
            "UPDATE jobs SET \
                status = CASE WHEN attempts >= max_attempts THEN 'failed'::job_status \
                              ELSE 'pending'::job_status END, \
                processed_at = CASE WHEN attempts >= max_attempts THEN NOW() ELSE NULL END, \
                locked_until = NULL, \
                payload = payload || jsonb_build_object('last_error', $2::text) \
             WHERE id = $1 AND status IN ('pending', 'processing') RETURNING status",
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to mark job as failed"))?;

        match status {
            Some(status) => Ok(status),
            None => self.settled_status(id).await,
        }
    }

    async fn abandon(&self, id: JobId, error: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', processed_at = NOW(), locked_until = NULL, \
             payload = payload || jsonb_build_object('last_error', $2::text) \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to abandon job"))?;

        if result.rows_affected() == 0 {
            self.settled_status(id).await?;
        }
        Ok(())
    }

    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find job"))
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error("Failed to count jobs"))
    }
}
