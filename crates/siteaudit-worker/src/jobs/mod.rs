//! Job handler implementations.

pub mod analyze;
pub mod crawl;

pub use analyze::AnalyzePageHandler;
pub use crawl::CrawlPageHandler;

use tracing::warn;

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_service::AuditProgression;

use crate::executor::JobExecutionError;
use crate::queue::ClaimedJob;

/// Persist a collaborator failure on the job's page and turn it into the
/// error that fails the attempt.
///
/// The page moves to Failed on every attempt, so it never holds its stage
/// while the job waits for a retry. The retry moves it back into the stage.
pub(crate) async fn settle_failure(
    progression: &AuditProgression,
    job: &ClaimedJob,
    error: AppError,
) -> JobExecutionError {
    let page_id = job.payload.page_id();
    let audit_id = job.payload.audit_id();

    if let Err(store_err) = progression.fail_page(page_id, audit_id, &error.message).await {
        warn!(page_id = %page_id, error = %store_err, "Could not record page failure");
        return JobExecutionError::Internal(store_err);
    }

    JobExecutionError::Transient(error.message)
}

/// Re-derive the audit of a job that has run out of attempts, whose failed
/// page only now counts as settled.
pub(crate) async fn settle_exhausted(
    progression: &AuditProgression,
    job: &ClaimedJob,
) -> AppResult<()> {
    progression.recompute(job.payload.audit_id()).await?;
    Ok(())
}
