//! Job counts per status.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use siteaudit_core::result::AppResult;
use siteaudit_database::JobStore;
use siteaudit_entity::job::JobStatus;

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Waiting to be claimed.
    pub pending: i64,
    /// Claimed and locked.
    pub processing: i64,
    /// Finished.
    pub completed: i64,
    /// Given up.
    pub failed: i64,
}

impl QueueStats {
    /// Jobs that still have work ahead of them.
    pub fn outstanding(&self) -> i64 {
        self.pending + self.processing
    }
}

/// Reports on the job queue.
#[derive(Debug, Clone)]
pub struct QueueService {
    /// Job store.
    jobs: Arc<dyn JobStore>,
}

impl QueueService {
    /// Creates a new queue service.
    pub fn new(jobs: Arc<dyn JobStore>) -> Self {
        Self { jobs }
    }

    /// Count jobs in every status.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        let mut stats = QueueStats::default();
        for status in JobStatus::all() {
            let n = self.jobs.count_by_status(status).await?;
            match status {
                JobStatus::Pending => stats.pending = n,
                JobStatus::Processing => stats.processing = n,
                JobStatus::Completed => stats.completed = n,
                JobStatus::Failed => stats.failed = n,
            }
        }
        Ok(stats)
    }
}
