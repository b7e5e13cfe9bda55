//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use siteaudit_core::result::AppResult;
use siteaudit_core::types::JobId;

use super::payload::JobPayload;
use super::status::{JobStatus, JobType};

/// Default claim ceiling for a job.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// A queued unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// What the job does.
    pub job_type: JobType,
    /// Job-specific payload (JSON), interpreted by the handler.
    pub payload: serde_json::Value,
    /// Current job status.
    pub status: JobStatus,
    /// Number of claims so far.
    pub attempts: i32,
    /// Claim ceiling.
    pub max_attempts: i32,
    /// Reclaim protection deadline for a claimed job.
    pub locked_until: Option<DateTime<Utc>>,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal state.
    pub processed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Whether a claim at `now` may take this job.
    ///
    /// Pending jobs are eligible once any lock has passed; Processing jobs
    /// are eligible once their lock has expired and claims remain.
    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        let lock_passed = self.locked_until.is_none_or(|until| until <= now);
        match self.status {
            JobStatus::Pending => lock_passed,
            JobStatus::Processing => {
                self.locked_until.is_some_and(|until| until <= now) && !self.attempts_exhausted()
            }
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }

    /// Whether every allowed claim has been used.
    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Decode the payload according to the job type.
    pub fn decode_payload(&self) -> AppResult<JobPayload> {
        JobPayload::decode(self.job_type, &self.payload)
    }
}

/// Data required to enqueue a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    /// Job type.
    pub job_type: JobType,
    /// Serialized payload.
    pub payload: serde_json::Value,
    /// Claim ceiling.
    pub max_attempts: i32,
}

impl CreateJob {
    /// Build an insert from a typed payload.
    pub fn from_payload(payload: &JobPayload, max_attempts: i32) -> AppResult<Self> {
        Ok(Self {
            job_type: payload.job_type(),
            payload: payload.to_value()?,
            max_attempts,
        })
    }
}
