//! In-memory job and audit store using a Tokio mutex for single-process
//! deployments and tests.
//!
//! Every operation takes the one lock for its whole duration, which gives
//! the same atomicity the PostgreSQL repositories get from transactions and
//! `FOR UPDATE SKIP LOCKED`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalysis, FetchedContent};
use siteaudit_core::types::{AuditId, IssueId, JobId, PageId};
use siteaudit_entity::audit::{Audit, AuditStatus, CreateAudit, PageStatusCounts};
use siteaudit_entity::issue::Issue;
use siteaudit_entity::job::{CrawlPagePayload, CreateJob, Job, JobPayload, JobStatus, JobType};
use siteaudit_entity::page::{Page, PageStatus};

use crate::repositories::audit::AUDIT_DELETED_ERROR;
use crate::repositories::job::LOCK_EXPIRED_ERROR;
use crate::store::{AuditStore, JobStore};

/// Internal state for the memory store.
#[derive(Debug, Default)]
struct InnerState {
    /// Jobs in insertion order, which is also claim order.
    jobs: Vec<Job>,
    /// Audits in creation order.
    audits: Vec<Audit>,
    /// Pages by id.
    pages: HashMap<PageId, Page>,
    /// Issues in insertion order.
    issues: Vec<Issue>,
    /// Shift applied to the wall clock.
    clock_offset: chrono::Duration,
}

impl InnerState {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    fn job_mut(&mut self, id: JobId) -> AppResult<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::not_found(format!("Job {id} not found")))
    }

    fn audit_mut(&mut self, id: AuditId) -> Option<&mut Audit> {
        self.audits.iter_mut().find(|a| a.id == id)
    }

    fn push_job(&mut self, data: &CreateJob) -> Job {
        let job = Job {
            id: JobId::new(),
            job_type: data.job_type,
            payload: data.payload.clone(),
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: data.max_attempts,
            locked_until: None,
            created_at: self.now(),
            processed_at: None,
        };
        self.jobs.push(job.clone());
        job
    }

    fn audit_is_live(&self, id: AuditId) -> bool {
        self.audits
            .iter()
            .any(|a| a.id == id && !a.status.is_terminal())
    }

    fn has_live_job(&self, page_id: PageId, job_type: Option<JobType>) -> bool {
        let page_id = page_id.to_string();
        self.jobs.iter().any(|j| {
            matches!(j.status, JobStatus::Pending | JobStatus::Processing)
                && job_type.is_none_or(|t| t == j.job_type)
                && j.payload.get("page_id").and_then(|v| v.as_str()) == Some(page_id.as_str())
        })
    }

    fn pages_in_order(&self, filter: impl Fn(&Page) -> bool) -> Vec<Page> {
        let mut pages: Vec<Page> = self.pages.values().filter(|p| filter(p)).cloned().collect();
        pages.sort_by(|a, b| {
            a.audit_id
                .as_uuid()
                .cmp(b.audit_id.as_uuid())
                .then(a.position.cmp(&b.position))
        });
        pages
    }
}

fn merge_last_error(payload: &mut serde_json::Value, error: &str) {
    if let Some(map) = payload.as_object_mut() {
        map.insert(
            "last_error".to_string(),
            serde_json::Value::String(error.to_string()),
        );
    }
}

/// Job and audit store kept in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Protected inner state.
    state: Arc<Mutex<InnerState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the store's clock forward. Lock expiry and orphan age are
    /// judged against the shifted clock.
    pub async fn advance_clock(&self, by: chrono::Duration) {
        let mut state = self.state.lock().await;
        state.clock_offset += by;
    }

    /// Snapshot of every job, in claim order.
    pub async fn jobs(&self) -> Vec<Job> {
        self.state.lock().await.jobs.clone()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn enqueue(&self, job: &CreateJob) -> AppResult<Job> {
        let mut state = self.state.lock().await;
        let job = state.push_job(job);
        debug!(job_id = %job.id, job_type = %job.job_type, "Job enqueued");
        Ok(job)
    }

    async fn claim_next(&self, lock_duration: Duration) -> AppResult<Option<Job>> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let lock = chrono::Duration::from_std(lock_duration)
            .map_err(|e| AppError::validation(format!("Lock duration out of range: {e}")))?;

        let mut expired = 0;
        for job in state.jobs.iter_mut() {
            let lock_passed = job.locked_until.is_some_and(|until| until <= now);
            if job.status == JobStatus::Processing && lock_passed && job.attempts_exhausted() {
                job.status = JobStatus::Failed;
                job.processed_at = Some(now);
                job.locked_until = None;
                merge_last_error(&mut job.payload, LOCK_EXPIRED_ERROR);
                expired += 1;
            }
        }
        if expired > 0 {
            warn!(count = expired, "Failed jobs whose final claim expired");
        }

        let Some(job) = state.jobs.iter_mut().find(|j| j.is_claimable_at(now)) else {
            return Ok(None);
        };
        job.status = JobStatus::Processing;
        job.attempts += 1;
        job.locked_until = Some(now + lock);
        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: JobId) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let job = state.job_mut(id)?;
        if job.status.is_terminal() {
            debug!(job_id = %id, status = %job.status, "Job already settled");
            return Ok(());
        }
        job.status = JobStatus::Completed;
        job.processed_at = Some(now);
        job.locked_until = None;
        Ok(())
    }

    async fn fail(&self, id: JobId, error: &str) -> AppResult<JobStatus> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let job = state.job_mut(id)?;
        if job.status.is_terminal() {
            return Ok(job.status);
        }
        if job.attempts_exhausted() {
            job.status = JobStatus::Failed;
            job.processed_at = Some(now);
        } else {
            job.status = JobStatus::Pending;
        }
        job.locked_until = None;
        merge_last_error(&mut job.payload, error);
        Ok(job.status)
    }

    async fn abandon(&self, id: JobId, error: &str) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let job = state.job_mut(id)?;
        if job.status.is_terminal() {
            return Ok(());
        }
        job.status = JobStatus::Failed;
        job.processed_at = Some(now);
        job.locked_until = None;
        merge_last_error(&mut job.payload, error);
        Ok(())
    }

    async fn find_job(&self, id: JobId) -> AppResult<Option<Job>> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn count_by_status(&self, status: JobStatus) -> AppResult<i64> {
        let state = self.state.lock().await;
        Ok(state.jobs.iter().filter(|j| j.status == status).count() as i64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn create_audit(&self, data: &CreateAudit) -> AppResult<Audit> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let audit = Audit {
            id: AuditId::new(),
            user_id: data.user_id,
            sitemap_url: data.sitemap_url.clone(),
            status: AuditStatus::Pending,
            total_urls: data.total_urls,
            processed_urls: 0,
            rate_limit_ms: data.rate_limit_ms,
            url_limit: data.url_limit,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };
        state.audits.push(audit.clone());
        Ok(audit)
    }

    async fn find_audit(&self, id: AuditId) -> AppResult<Option<Audit>> {
        let state = self.state.lock().await;
        Ok(state.audits.iter().find(|a| a.id == id).cloned())
    }

    async fn list_audits(&self, limit: i64) -> AppResult<Vec<Audit>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state.audits.iter().rev().take(limit).cloned().collect())
    }

    async fn list_unfinished_audits(&self) -> AppResult<Vec<Audit>> {
        let state = self.state.lock().await;
        Ok(state
            .audits
            .iter()
            .filter(|a| !a.status.is_terminal())
            .cloned()
            .collect())
    }

    async fn delete_audit(&self, id: AuditId) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.audits.len();
        state.audits.retain(|a| a.id != id);
        if state.audits.len() == before {
            return Ok(false);
        }

        state.pages.retain(|_, p| p.audit_id != id);
        let pages = &state.pages;
        let orphaned: Vec<IssueId> = state
            .issues
            .iter()
            .filter(|i| !pages.contains_key(&i.page_id))
            .map(|i| i.id)
            .collect();
        state.issues.retain(|i| !orphaned.contains(&i.id));

        let now = state.now();
        let audit_id = id.to_string();
        for job in state.jobs.iter_mut().filter(|j| {
            !j.status.is_terminal()
                && j.payload.get("audit_id").and_then(|v| v.as_str()) == Some(audit_id.as_str())
        }) {
            job.status = JobStatus::Failed;
            job.processed_at = Some(now);
            job.locked_until = None;
            merge_last_error(&mut job.payload, AUDIT_DELETED_ERROR);
        }
        Ok(true)
    }

    async fn seed_pages(
        &self,
        audit: &Audit,
        urls: &[String],
        max_attempts: i32,
    ) -> AppResult<Vec<Page>> {
        let mut state = self.state.lock().await;
        let now = state.now();

        let mut pages = Vec::with_capacity(urls.len());
        let mut jobs = Vec::with_capacity(urls.len());
        for (position, url) in urls.iter().enumerate() {
            let page = Page {
                id: PageId::new(),
                audit_id: audit.id,
                url: url.clone(),
                position: position as i32,
                status: PageStatus::Pending,
                title: None,
                content: None,
                quality_score: None,
                error_message: None,
                created_at: now,
                analyzed_at: None,
            };
            let payload = JobPayload::CrawlPage(CrawlPagePayload {
                audit_id: audit.id,
                page_id: page.id,
                url: url.clone(),
                rate_limit_ms: audit.rate_limit_ms,
            });
            // Build everything first so a bad payload leaves no partial seed.
            jobs.push(CreateJob::from_payload(&payload, max_attempts)?);
            pages.push(page);
        }

        let Some(stored) = state.audit_mut(audit.id) else {
            return Err(AppError::not_found(format!("Audit {} not found", audit.id)));
        };
        if stored.status == AuditStatus::Pending {
            stored.status = AuditStatus::Crawling;
            stored.updated_at = now;
        }

        for page in &pages {
            state.pages.insert(page.id, page.clone());
        }
        for job in &jobs {
            state.push_job(job);
        }
        Ok(pages)
    }

    async fn update_audit_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let Some(audit) = state.audit_mut(id) else {
            return Ok(false);
        };
        if !from.contains(&audit.status) {
            return Ok(false);
        }
        audit.status = to;
        audit.updated_at = now;
        if to == AuditStatus::Completed {
            audit.completed_at = Some(now);
        }
        Ok(true)
    }

    async fn find_page(&self, id: PageId) -> AppResult<Option<Page>> {
        let state = self.state.lock().await;
        Ok(state.pages.get(&id).cloned())
    }

    async fn list_pages(&self, audit_id: AuditId) -> AppResult<Vec<Page>> {
        let state = self.state.lock().await;
        Ok(state.pages_in_order(|p| p.audit_id == audit_id))
    }

    async fn count_pages_by_status(&self, audit_id: AuditId) -> AppResult<PageStatusCounts> {
        let state = self.state.lock().await;
        let pages: Vec<&Page> = state
            .pages
            .values()
            .filter(|p| p.audit_id == audit_id)
            .collect();
        let mut counts = PageStatusCounts::from_statuses(pages.iter().map(|p| p.status));
        counts.retrying = pages
            .iter()
            .filter(|p| p.status == PageStatus::Failed && state.has_live_job(p.id, None))
            .count() as i64;
        Ok(counts)
    }

    async fn transition_page(&self, id: PageId, to: PageStatus) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.pages.get_mut(&id) {
            Some(page) if page.can_resume(to) => {
                page.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_page(&self, id: PageId, error: &str) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.pages.get_mut(&id) {
            Some(page) if page.status.can_transition_to(PageStatus::Failed) => {
                page.status = PageStatus::Failed;
                page.error_message = Some(error.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_crawl(
        &self,
        id: PageId,
        content: &FetchedContent,
        analyze_job: &CreateJob,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        match state.pages.get_mut(&id) {
            Some(page) if page.status == PageStatus::Crawling => {
                page.status = PageStatus::Analyzing;
                page.title = content.title.clone();
                page.content = Some(content.content.clone());
                page.error_message = None;
            }
            _ => return Ok(false),
        }
        state.push_job(analyze_job);
        Ok(true)
    }

    async fn complete_analysis(&self, id: PageId, analysis: &ContentAnalysis) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let now = state.now();
        let audit_id = match state.pages.get_mut(&id) {
            Some(page) if page.status == PageStatus::Analyzing => {
                page.status = PageStatus::Completed;
                page.quality_score = Some(analysis.quality_score);
                page.analyzed_at = Some(now);
                page.error_message = None;
                page.audit_id
            }
            _ => return Ok(false),
        };

        for issue in &analysis.issues {
            state.issues.push(Issue {
                id: IssueId::new(),
                page_id: id,
                issue_type: issue.issue_type,
                severity: issue.severity,
                description: issue.description.clone(),
                snippet: issue.snippet.clone(),
                suggestion: issue.suggestion.clone(),
                created_at: now,
            });
        }

        if let Some(audit) = state.audit_mut(audit_id) {
            audit.processed_urls += 1;
            audit.updated_at = now;
        }
        Ok(true)
    }

    async fn list_issues_for_audit(&self, audit_id: AuditId) -> AppResult<Vec<Issue>> {
        let state = self.state.lock().await;
        let pages = state.pages_in_order(|p| p.audit_id == audit_id);
        Ok(pages
            .iter()
            .flat_map(|page| state.issues.iter().filter(move |i| i.page_id == page.id))
            .cloned()
            .collect())
    }

    async fn find_orphan_pages(&self, older_than: DateTime<Utc>) -> AppResult<Vec<Page>> {
        let state = self.state.lock().await;
        Ok(state.pages_in_order(|p| {
            p.status == PageStatus::Pending
                && p.created_at < older_than
                && state.audit_is_live(p.audit_id)
                && !state.has_live_job(p.id, Some(JobType::CrawlPage))
        }))
    }

    async fn find_stranded_pages(&self) -> AppResult<Vec<Page>> {
        let state = self.state.lock().await;
        Ok(state.pages_in_order(|p| {
            matches!(p.status, PageStatus::Crawling | PageStatus::Analyzing)
                && state.audit_is_live(p.audit_id)
                && !state.has_live_job(p.id, None)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siteaudit_core::types::{IssueSeverity, IssueType};
    use siteaudit_core::traits::DetectedIssue;
    use siteaudit_entity::job::AnalyzePagePayload;

    const LOCK: Duration = Duration::from_secs(300);

    fn crawl_job(max_attempts: i32) -> CreateJob {
        let payload = JobPayload::CrawlPage(CrawlPagePayload {
            audit_id: AuditId::new(),
            page_id: PageId::new(),
            url: "https://example.com/".to_string(),
            rate_limit_ms: 0,
        });
        CreateJob::from_payload(&payload, max_attempts).expect("payload")
    }

    async fn seeded(store: &MemoryStore, urls: &[&str]) -> (Audit, Vec<Page>) {
        let audit = store
            .create_audit(&CreateAudit {
                user_id: None,
                sitemap_url: "https://example.com/sitemap.xml".to_string(),
                total_urls: urls.len() as i32,
                rate_limit_ms: 0,
                url_limit: None,
            })
            .await
            .expect("create audit");
        let urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
        let pages = store.seed_pages(&audit, &urls, 3).await.expect("seed");
        (audit, pages)
    }

    #[tokio::test]
    async fn test_concurrent_claimers_receive_a_job_once() {
        let store = MemoryStore::new();
        store.enqueue(&crawl_job(3)).await.expect("enqueue");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.claim_next(LOCK).await }));
        }

        let mut winners = 0;
        for handle in futures::future::join_all(handles).await {
            if handle.expect("join").expect("claim").is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_claim_sets_lock_and_attempts() {
        let store = MemoryStore::new();
        store.enqueue(&crawl_job(3)).await.expect("enqueue");

        let job = store.claim_next(LOCK).await.expect("claim").expect("job");
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.attempts, 1);
        assert!(job.locked_until.is_some());
        assert!(store.claim_next(LOCK).await.expect("claim").is_none());
    }

    #[tokio::test]
    async fn test_expired_lock_is_reclaimed_only_after_expiry() {
        let store = MemoryStore::new();
        let enqueued = store.enqueue(&crawl_job(3)).await.expect("enqueue");
        store.claim_next(LOCK).await.expect("claim").expect("job");

        store.advance_clock(chrono::Duration::seconds(299)).await;
        assert!(store.claim_next(LOCK).await.expect("claim").is_none());

        store.advance_clock(chrono::Duration::seconds(2)).await;
        let reclaimed = store.claim_next(LOCK).await.expect("claim").expect("job");
        assert_eq!(reclaimed.id, enqueued.id);
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn test_expired_final_claim_fails_the_job() {
        let store = MemoryStore::new();
        let enqueued = store.enqueue(&crawl_job(1)).await.expect("enqueue");
        store.claim_next(LOCK).await.expect("claim").expect("job");

        store.advance_clock(chrono::Duration::seconds(301)).await;
        assert!(store.claim_next(LOCK).await.expect("claim").is_none());

        let job = store.find_job(enqueued.id).await.expect("find").expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.payload["last_error"], LOCK_EXPIRED_ERROR);
    }

    #[tokio::test]
    async fn test_failures_retry_until_exhausted() {
        let store = MemoryStore::new();
        let enqueued = store.enqueue(&crawl_job(3)).await.expect("enqueue");

        for expected in [JobStatus::Pending, JobStatus::Pending, JobStatus::Failed] {
            let job = store.claim_next(LOCK).await.expect("claim").expect("job");
            assert_eq!(job.id, enqueued.id);
            let status = store.fail(job.id, "boom").await.expect("fail");
            assert_eq!(status, expected);
        }

        assert!(store.claim_next(LOCK).await.expect("claim").is_none());
        let job = store.find_job(enqueued.id).await.expect("find").expect("job");
        assert_eq!(job.attempts, 3);
        assert!(job.processed_at.is_some());
    }

    #[tokio::test]
    async fn test_abandon_fails_with_attempts_left() {
        let store = MemoryStore::new();
        let enqueued = store.enqueue(&crawl_job(3)).await.expect("enqueue");
        store.claim_next(LOCK).await.expect("claim");
        store.abandon(enqueued.id, "no handler").await.expect("abandon");

        let job = store.find_job(enqueued.id).await.expect("find").expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.payload["last_error"], "no handler");
        assert!(store.claim_next(LOCK).await.expect("claim").is_none());
    }

    #[tokio::test]
    async fn test_fail_merges_error_without_touching_payload_fields() {
        let store = MemoryStore::new();
        let enqueued = store.enqueue(&crawl_job(3)).await.expect("enqueue");
        store.claim_next(LOCK).await.expect("claim");
        store.fail(enqueued.id, "timeout").await.expect("fail");

        let job = store.find_job(enqueued.id).await.expect("find").expect("job");
        assert_eq!(job.payload["last_error"], "timeout");
        assert_eq!(job.payload["url"], "https://example.com/");
        assert!(job.decode_payload().is_ok());
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let store = MemoryStore::new();
        let err = store.complete(JobId::new()).await.unwrap_err();
        assert_eq!(err.kind, siteaudit_core::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_seeding_is_ordered_and_marks_audit_crawling() {
        let store = MemoryStore::new();
        let urls = ["https://a.test/1", "https://a.test/2", "https://a.test/3"];
        let (audit, pages) = seeded(&store, &urls).await;

        let audit = store.find_audit(audit.id).await.expect("find").expect("audit");
        assert_eq!(audit.status, AuditStatus::Crawling);
        assert_eq!(pages.len(), 3);

        for (url, page) in urls.iter().zip(&pages) {
            let job = store.claim_next(LOCK).await.expect("claim").expect("job");
            match job.decode_payload().expect("payload") {
                JobPayload::CrawlPage(p) => {
                    assert_eq!(p.url, *url);
                    assert_eq!(p.page_id, page.id);
                    assert_eq!(p.audit_id, audit.id);
                }
                other => panic!("unexpected payload {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_page_never_returns_to_pending() {
        let store = MemoryStore::new();
        let (_, pages) = seeded(&store, &["https://a.test/1"]).await;
        let id = pages[0].id;

        assert!(store.transition_page(id, PageStatus::Crawling).await.expect("t"));
        assert!(store.transition_page(id, PageStatus::Crawling).await.expect("t"));
        assert!(!store.transition_page(id, PageStatus::Pending).await.expect("t"));
        assert!(!store.transition_page(id, PageStatus::Completed).await.expect("t"));

        let page = store.find_page(id).await.expect("find").expect("page");
        assert_eq!(page.status, PageStatus::Crawling);
    }

    #[tokio::test]
    async fn test_crawl_then_analysis_persists_results() {
        let store = MemoryStore::new();
        let (audit, pages) = seeded(&store, &["https://a.test/1"]).await;
        let page = &pages[0];
        store.transition_page(page.id, PageStatus::Crawling).await.expect("t");

        let analyze = CreateJob::from_payload(
            &JobPayload::AnalyzePage(AnalyzePagePayload {
                audit_id: audit.id,
                page_id: page.id,
                url: page.url.clone(),
            }),
            3,
        )
        .expect("payload");
        let content = FetchedContent {
            title: Some("Home".to_string()),
            content: "Lorem ipsum".to_string(),
        };
        assert!(store.complete_crawl(page.id, &content, &analyze).await.expect("crawl"));
        assert!(!store.complete_crawl(page.id, &content, &analyze).await.expect("crawl"));
        assert_eq!(store.jobs().await.len(), 2);

        let analysis = ContentAnalysis {
            quality_score: 40,
            issues: vec![DetectedIssue {
                issue_type: IssueType::Placeholder,
                severity: IssueSeverity::High,
                description: "Placeholder text".to_string(),
                snippet: "Lorem ipsum".to_string(),
                suggestion: None,
            }],
        };
        assert!(store.complete_analysis(page.id, &analysis).await.expect("analysis"));

        let page = store.find_page(page.id).await.expect("find").expect("page");
        assert_eq!(page.status, PageStatus::Completed);
        assert_eq!(page.quality_score, Some(40));
        let audit = store.find_audit(audit.id).await.expect("find").expect("audit");
        assert_eq!(audit.processed_urls, 1);
        assert_eq!(store.list_issues_for_audit(audit.id).await.expect("issues").len(), 1);
    }

    #[tokio::test]
    async fn test_orphan_and_stranded_detection() {
        let store = MemoryStore::new();
        let (_, pages) = seeded(&store, &["https://a.test/1", "https://a.test/2"]).await;

        store.advance_clock(chrono::Duration::seconds(60)).await;
        assert!(store.find_orphan_pages(Utc::now() + chrono::Duration::seconds(60)).await.expect("orphans").is_empty());

        // Exhaust the first page's crawl job while it is Crawling.
        let job = store.claim_next(LOCK).await.expect("claim").expect("job");
        store.transition_page(pages[0].id, PageStatus::Crawling).await.expect("t");
        for _ in 0..3 {
            store.fail(job.id, "boom").await.expect("fail");
            store.claim_next(LOCK).await.expect("claim");
        }
        let stranded = store.find_stranded_pages().await.expect("stranded");
        assert_eq!(stranded.len(), 1);
        assert_eq!(stranded[0].id, pages[0].id);
    }

    #[tokio::test]
    async fn test_delete_audit_removes_pages_and_fails_live_jobs() {
        let store = MemoryStore::new();
        let (audit, pages) = seeded(&store, &["https://a.test/1", "https://a.test/2"]).await;
        let in_flight = store.claim_next(LOCK).await.expect("claim").expect("job");

        assert!(store.delete_audit(audit.id).await.expect("delete"));
        assert!(!store.delete_audit(audit.id).await.expect("delete"));
        assert!(store.find_page(pages[0].id).await.expect("find").is_none());
        assert!(store.claim_next(LOCK).await.expect("claim").is_none());

        let jobs = store.jobs().await;
        assert_eq!(jobs.len(), 2, "job rows are kept");
        for job in &jobs {
            assert_eq!(job.status, JobStatus::Failed);
            assert!(job.processed_at.is_some());
            assert_eq!(job.payload["last_error"], AUDIT_DELETED_ERROR);
        }

        // The worker still holding a claim settles without error and
        // without reviving the job.
        store.complete(in_flight.id).await.expect("complete");
        assert_eq!(
            store.fail(in_flight.id, "late").await.expect("fail"),
            JobStatus::Failed
        );
        let job = store.find_job(in_flight.id).await.expect("find").expect("job");
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.payload["last_error"], AUDIT_DELETED_ERROR);
    }

    #[tokio::test]
    async fn test_failed_page_resumes_its_stage_and_counts_as_retrying() {
        let store = MemoryStore::new();
        let (audit, pages) = seeded(&store, &["https://a.test/1"]).await;
        let id = pages[0].id;

        let job = store.claim_next(LOCK).await.expect("claim").expect("job");
        assert!(store.transition_page(id, PageStatus::Crawling).await.expect("t"));
        assert!(store.fail_page(id, "HTTP 503").await.expect("fail page"));
        assert_eq!(store.fail(job.id, "HTTP 503").await.expect("fail"), JobStatus::Pending);

        let counts = store.count_pages_by_status(audit.id).await.expect("counts");
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.retrying, 1);
        assert!(!counts.all_settled());

        assert!(!store.transition_page(id, PageStatus::Analyzing).await.expect("t"));
        assert!(store.transition_page(id, PageStatus::Crawling).await.expect("t"));
        assert!(store.fail_page(id, "HTTP 503").await.expect("fail page"));

        // Use up the job; the failed page is then settled.
        let mut status = JobStatus::Pending;
        while status != JobStatus::Failed {
            store.claim_next(LOCK).await.expect("claim").expect("job");
            status = store.fail(job.id, "HTTP 503").await.expect("fail");
        }
        let counts = store.count_pages_by_status(audit.id).await.expect("counts");
        assert_eq!(counts.retrying, 0);
        assert!(counts.all_settled());
    }
}
