//! Storage contracts shared by the PostgreSQL repositories and the
//! in-memory store.
//!
//! Operations that must be atomic across tables (seeding an audit, finishing
//! a crawl, finishing an analysis) are single trait methods so each backend
//! can keep them inside one transaction or one critical section.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalysis, FetchedContent};
use siteaudit_core::types::{AuditId, JobId, PageId};
use siteaudit_entity::audit::{Audit, AuditStatus, CreateAudit, PageStatusCounts};
use siteaudit_entity::issue::Issue;
use siteaudit_entity::job::{CreateJob, Job, JobStatus};
use siteaudit_entity::page::{Page, PageStatus};

/// Durable queue of crawl and analysis jobs.
#[async_trait]
pub trait JobStore: Send + Sync + Debug {
    /// Insert a Pending job with zero attempts.
    async fn enqueue(&self, job: &CreateJob) -> AppResult<Job>;

    /// Atomically claim the oldest eligible job.
    ///
    /// The claimed job moves to Processing with one more attempt and a lock
    /// of `lock_duration`. Expired Processing jobs whose attempts are used up
    /// are failed before the claim. Returns `None` when nothing is eligible.
    async fn claim_next(&self, lock_duration: Duration) -> AppResult<Option<Job>>;

    /// Mark a job Completed. A job already Completed or Failed is left as
    /// it is.
    async fn complete(&self, id: JobId) -> AppResult<()>;

    /// Record a failed attempt and return the resulting status: Failed once
    /// attempts reach the ceiling, otherwise Pending for immediate retry.
    /// A job already Completed or Failed is left as it is.
    async fn fail(&self, id: JobId, error: &str) -> AppResult<JobStatus>;

    /// Fail a job at once, whatever attempts it has left.
    async fn abandon(&self, id: JobId, error: &str) -> AppResult<()>;

    /// Look up a job.
    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Count jobs in a status.
    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64>;
}

/// Audits, their pages and the issues found on them.
#[async_trait]
pub trait AuditStore: Send + Sync + Debug {
    /// Insert a Pending audit.
    async fn create_audit(&self, data: &CreateAudit) -> AppResult<Audit>;

    /// Look up an audit.
    async fn find_audit(&self, id: AuditId) -> AppResult<Option<Audit>>;

    /// Most recent audits first.
    async fn list_audits(&self, limit: i64) -> AppResult<Vec<Audit>>;

    /// Audits not yet Completed or Failed, oldest first.
    async fn list_unfinished_audits(&self) -> AppResult<Vec<Audit>>;

    /// Delete an audit with its pages and issues, and fail its Pending and
    /// Processing jobs with an "Audit deleted" error. Job rows are kept.
    /// Returns whether the audit existed.
    async fn delete_audit(&self, id: AuditId) -> AppResult<bool>;

    /// Insert one Pending page per URL, one crawl job per page, and move the
    /// audit to Crawling, all or nothing. Each crawl job carries the audit's
    /// rate limit and allows `max_attempts` claims. Returns the pages in URL
    /// order.
    async fn seed_pages(
        &self,
        audit: &Audit,
        urls: &[String],
        max_attempts: i32,
    ) -> AppResult<Vec<Page>>;

    /// Move an audit to `to` if its current status is one of `from`.
    /// Returns whether the row changed.
    async fn update_audit_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> AppResult<bool>;

    /// Look up a page.
    async fn find_page(&self, id: PageId) -> AppResult<Option<Page>>;

    /// Pages of an audit in sitemap order.
    async fn list_pages(&self, audit_id: AuditId) -> AppResult<Vec<Page>>;

    /// Tally the audit's pages by status, counting Failed pages that still
    /// have a Pending or Processing job as retrying.
    async fn count_pages_by_status(&self, audit_id: AuditId) -> AppResult<PageStatusCounts>;

    /// Move a page to `to` when [`Page::can_resume`] allows it.
    /// Returns whether the row changed.
    async fn transition_page(&self, id: PageId, to: PageStatus) -> AppResult<bool>;

    /// Move a page to Failed with its error. Returns whether the row changed.
    async fn fail_page(&self, id: PageId, error: &str) -> AppResult<bool>;

    /// Persist crawl output, move the page Crawling → Analyzing and enqueue
    /// its analysis job, atomically. Returns whether the page moved.
    async fn complete_crawl(
        &self,
        id: PageId,
        content: &FetchedContent,
        analyze_job: &CreateJob,
    ) -> AppResult<bool>;

    /// Persist analysis output and its issues, move the page
    /// Analyzing → Completed and bump the audit's processed count,
    /// atomically. Returns whether the page moved.
    async fn complete_analysis(&self, id: PageId, analysis: &ContentAnalysis) -> AppResult<bool>;

    /// Issues of every page of an audit, grouped by page in sitemap order.
    async fn list_issues_for_audit(&self, audit_id: AuditId) -> AppResult<Vec<Issue>>;

    /// Pending pages of live audits, created before `older_than`, with no
    /// Pending or Processing crawl job.
    async fn find_orphan_pages(&self, older_than: DateTime<Utc>) -> AppResult<Vec<Page>>;

    /// Crawling or Analyzing pages of live audits with no Pending or
    /// Processing job left to move them on.
    async fn find_stranded_pages(&self) -> AppResult<Vec<Page>>;
}
