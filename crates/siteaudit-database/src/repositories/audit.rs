//! Audit, page and issue repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalysis, FetchedContent};
use siteaudit_core::types::{AuditId, IssueId, PageId};
use siteaudit_entity::audit::{Audit, AuditStatus, CreateAudit, PageStatusCounts};
use siteaudit_entity::issue::Issue;
use siteaudit_entity::job::{CreateJob, CrawlPagePayload, JobPayload, JobType};
use siteaudit_entity::page::{Page, PageStatus};

use super::{db_error, insert_job};
use crate::store::AuditStore;

/// Error merged into the live jobs of a deleted audit.
pub(crate) const AUDIT_DELETED_ERROR: &str = "Audit deleted";

/// Repository for the `audits`, `pages` and `issues` tables.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    /// Create a new audit repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn status_names<T: std::fmt::Display>(statuses: &[T]) -> Vec<String> {
    statuses.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl AuditStore for AuditRepository {
    async fn create_audit(&self, data: &CreateAudit) -> AppResult<Audit> {
        sqlx::query_as::<_, Audit>(
            "INSERT INTO audits (id, user_id, sitemap_url, total_urls, rate_limit_ms, url_limit) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(AuditId::new())
        .bind(data.user_id)
        .bind(&data.sitemap_url)
        .bind(data.total_urls)
        .bind(data.rate_limit_ms)
        .bind(data.url_limit)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to create audit"))
    }

    async fn find_audit(&self, id: AuditId) -> AppResult<Option<Audit>> {
        sqlx::query_as::<_, Audit>("SELECT * FROM audits WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find audit"))
    }

    async fn list_audits(&self, limit: i64) -> AppResult<Vec<Audit>> {
        sqlx::query_as::<_, Audit>("SELECT * FROM audits ORDER BY created_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list audits"))
    }

    async fn list_unfinished_audits(&self) -> AppResult<Vec<Audit>> {
        sqlx::query_as::<_, Audit>(
            "SELECT * FROM audits WHERE status NOT IN ('completed', 'failed') \
             ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list unfinished audits"))
    }

    async fn delete_audit(&self, id: AuditId) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        // Jobs only reference pages through their payload, so no cascade
        // reaches them. They stay as history; live ones are failed.
        sqlx::query(
            "UPDATE jobs SET status = 'failed', processed_at = NOW(), locked_until = NULL, \
             payload = payload || jsonb_build_object('last_error', $2::text) \
             WHERE payload ->> 'audit_id' = $1::text \
             AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(AUDIT_DELETED_ERROR)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to fail audit jobs"))?;

        let result = sqlx::query("DELETE FROM audits WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to delete audit"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit audit deletion"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn seed_pages(
        &self,
        audit: &Audit,
        urls: &[String],
        max_attempts: i32,
    ) -> AppResult<Vec<Page>> {
        let ids: Vec<Uuid> = urls.iter().map(|_| Uuid::new_v4()).collect();
        let positions: Vec<i32> = (0..urls.len() as i32).collect();

        let mut payloads = Vec::with_capacity(urls.len());
        for (id, url) in ids.iter().zip(urls) {
            let payload = JobPayload::CrawlPage(CrawlPagePayload {
                audit_id: audit.id,
                page_id: PageId::from_uuid(*id),
                url: url.clone(),
                rate_limit_ms: audit.rate_limit_ms,
            });
            payloads.push(payload.to_value()?);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        sqlx::query(
            "INSERT INTO pages (id, audit_id, url, position) \
             SELECT u.id, $4, u.url, u.position \
             FROM UNNEST($1::uuid[], $2::text[], $3::int4[]) AS u(id, url, position)",
        )
        .bind(&ids)
        .bind(urls)
        .bind(&positions)
        .bind(audit.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert pages"))?;

        sqlx::query(
            "INSERT INTO jobs (job_type, payload, max_attempts) \
             SELECT $2, p.payload, $3 \
             FROM UNNEST($1::jsonb[]) WITH ORDINALITY AS p(payload, ord) \
             ORDER BY p.ord",
        )
        .bind(&payloads)
        .bind(JobType::CrawlPage)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to enqueue crawl jobs"))?;

        sqlx::query(
            "UPDATE audits SET status = 'crawling', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(audit.id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to mark audit crawling"))?;

        let pages = sqlx::query_as::<_, Page>(
            "SELECT * FROM pages WHERE audit_id = $1 ORDER BY position",
        )
        .bind(audit.id)
        .fetch_all(&mut *tx)
        .await
        .map_err(db_error("Failed to load seeded pages"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit audit seeding"))?;

        debug!(audit_id = %audit.id, pages = pages.len(), "Audit seeded");
        Ok(pages)
    }

    async fn update_audit_status(
        &self,
        id: AuditId,
        from: &[AuditStatus],
        to: AuditStatus,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE audits SET status = $2, updated_at = NOW(), \
             completed_at = CASE WHEN $2 = 'completed'::audit_status THEN NOW() ELSE completed_at END \
             WHERE id = $1 AND status::text = ANY($3::text[])",
        )
        .bind(id)
        .bind(to)
        .bind(status_names(from))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update audit status"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_page(&self, id: PageId) -> AppResult<Option<Page>> {
        sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to find page"))
    }

    async fn list_pages(&self, audit_id: AuditId) -> AppResult<Vec<Page>> {
        sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE audit_id = $1 ORDER BY position")
            .bind(audit_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list pages"))
    }

    async fn count_pages_by_status(&self, audit_id: AuditId) -> AppResult<PageStatusCounts> {
        let rows = sqlx::query_as::<_, (PageStatus, i64, i64)>(
            "SELECT p.status, COUNT(*), \
                COUNT(*) FILTER (WHERE p.status = 'failed' AND EXISTS ( \
                    SELECT 1 FROM jobs j \
                    WHERE j.status IN ('pending', 'processing') \
                      AND j.payload ->> 'page_id' = p.id::text)) \
             FROM pages p WHERE p.audit_id = $1 GROUP BY p.status",
        )
        .bind(audit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to count pages"))?;

        let mut counts = PageStatusCounts::default();
        for (status, n, retrying) in rows {
            counts.add(status, n);
            counts.retrying += retrying;
        }
        Ok(counts)
    }

    async fn transition_page(&self, id: PageId, to: PageStatus) -> AppResult<bool> {
        // A Failed page re-enters crawling only without content, analysis only with it.
        let result = sqlx::query(
            "UPDATE pages SET status = $2 WHERE id = $1 AND status::text = ANY($3::text[]) \
             AND (status <> 'failed' OR (content IS NULL) = $4)",
        )
        .bind(id)
        .bind(to)
        .bind(status_names(to.allowed_predecessors()))
        .bind(to == PageStatus::Crawling)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update page status"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn fail_page(&self, id: PageId, error: &str) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE pages SET status = 'failed', error_message = $2 \
             WHERE id = $1 AND status::text = ANY($3::text[])",
        )
        .bind(id)
        .bind(error)
        .bind(status_names(PageStatus::Failed.allowed_predecessors()))
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to fail page"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_crawl(
        &self,
        id: PageId,
        content: &FetchedContent,
        analyze_job: &CreateJob,
    ) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let result = sqlx::query(
            "UPDATE pages SET status = 'analyzing', title = $2, content = $3, error_message = NULL \
             WHERE id = $1 AND status = 'crawling'",
        )
        .bind(id)
        .bind(content.title.as_deref())
        .bind(&content.content)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to store crawl result"))?;

        if result.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(db_error("Failed to roll back crawl result"))?;
            return Ok(false);
        }

        insert_job(&mut *tx, analyze_job).await?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit crawl result"))?;
        Ok(true)
    }

    async fn complete_analysis(&self, id: PageId, analysis: &ContentAnalysis) -> AppResult<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        let audit_id = sqlx::query_scalar::<_, AuditId>(
            "UPDATE pages SET status = 'completed', quality_score = $2, analyzed_at = NOW(), \
             error_message = NULL \
             WHERE id = $1 AND status = 'analyzing' RETURNING audit_id",
        )
        .bind(id)
        .bind(analysis.quality_score)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to store analysis result"))?;

        let Some(audit_id) = audit_id else {
            tx.rollback()
                .await
                .map_err(db_error("Failed to roll back analysis result"))?;
            return Ok(false);
        };

        for issue in &analysis.issues {
            sqlx::query(
                "INSERT INTO issues (id, page_id, issue_type, severity, description, snippet, suggestion) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(IssueId::new())
            .bind(id)
            .bind(issue.issue_type)
            .bind(issue.severity)
            .bind(&issue.description)
            .bind(&issue.snippet)
            .bind(issue.suggestion.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert issue"))?;
        }

        sqlx::query(
            "UPDATE audits SET processed_urls = processed_urls + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(audit_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to bump processed count"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit analysis result"))?;
        Ok(true)
    }

    async fn list_issues_for_audit(&self, audit_id: AuditId) -> AppResult<Vec<Issue>> {
        sqlx::query_as::<_, Issue>(
            "SELECT i.* FROM issues i JOIN pages p ON p.id = i.page_id \
             WHERE p.audit_id = $1 ORDER BY p.position, i.created_at, i.id",
        )
        .bind(audit_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list issues"))
    }

    async fn find_orphan_pages(&self, older_than: DateTime<Utc>) -> AppResult<Vec<Page>> {
        sqlx::query_as::<_, Page>(
            "SELECT p.* FROM pages p JOIN audits a ON a.id = p.audit_id \
             WHERE p.status = 'pending' AND p.created_at < $1 \
               AND a.status NOT IN ('completed', 'failed') \
               AND NOT EXISTS ( \
                   SELECT 1 FROM jobs j \
                   WHERE j.job_type = 'crawl_page' AND j.status IN ('pending', 'processing') \
                     AND j.payload ->> 'page_id' = p.id::text) \
             ORDER BY p.audit_id, p.position",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find orphan pages"))
    }

    async fn find_stranded_pages(&self) -> AppResult<Vec<Page>> {
        sqlx::query_as::<_, Page>(
            "SELECT p.* FROM pages p JOIN audits a ON a.id = p.audit_id \
             WHERE p.status IN ('crawling', 'analyzing') \
               AND a.status NOT IN ('completed', 'failed') \
               AND NOT EXISTS ( \
                   SELECT 1 FROM jobs j \
                   WHERE j.status IN ('pending', 'processing') \
                     AND j.payload ->> 'page_id' = p.id::text) \
             ORDER BY p.audit_id, p.position",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to find stranded pages"))
    }
}
