//! PostgreSQL implementations of the store contracts.

pub mod audit;
pub mod job;

pub use audit::AuditRepository;
pub use job::JobRepository;

use sqlx::PgExecutor;

use siteaudit_core::error::{AppError, ErrorKind};
use siteaudit_core::result::AppResult;
use siteaudit_entity::job::{CreateJob, Job};

/// Insert a Pending job through any executor, so callers inside a
/// transaction can enqueue alongside their own writes.
pub(crate) async fn insert_job<'e, E>(executor: E, data: &CreateJob) -> AppResult<Job>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Job>(
        "INSERT INTO jobs (job_type, payload, max_attempts) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(data.job_type)
    .bind(&data.payload)
    .bind(data.max_attempts)
    .fetch_one(executor)
    .await
    .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to enqueue job", e))
}

/// Map a sqlx error into a database [`AppError`] with context.
pub(crate) fn db_error(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}
