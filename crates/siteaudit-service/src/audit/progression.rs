//! Page and audit state progression.
//!
//! Workers never change a status directly; they go through
//! [`AuditProgression`], which applies the page transition and then
//! re-derives the owning audit's status from its page counts.

use std::sync::Arc;

use tracing::{debug, info};

use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalysis, FetchedContent};
use siteaudit_core::types::{AuditId, PageId};
use siteaudit_database::AuditStore;
use siteaudit_entity::audit::{AuditStatus, PageStatusCounts};
use siteaudit_entity::job::CreateJob;
use siteaudit_entity::page::{Page, PageStatus};

/// Derive the status an audit should move to, if any.
///
/// Terminal audits stay put. An audit whose pages are all Completed or
/// Failed, with no failed page awaiting a retry, is Completed, partial
/// failures included. An audit with pages in
/// analysis and none crawling is Analyzing. Anything else is unchanged.
pub fn derive_audit_status(current: AuditStatus, counts: &PageStatusCounts) -> Option<AuditStatus> {
    if current.is_terminal() {
        return None;
    }

    let next = if counts.total() > 0 && counts.all_settled() {
        AuditStatus::Completed
    } else if counts.analyzing > 0 && counts.crawling == 0 {
        AuditStatus::Analyzing
    } else {
        return None;
    };

    (next != current).then_some(next)
}

/// Applies page transitions and keeps audit status in step with them.
#[derive(Debug, Clone)]
pub struct AuditProgression {
    /// Audit store.
    store: Arc<dyn AuditStore>,
}

impl AuditProgression {
    /// Creates a new progression over the given store.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Current state of a page.
    pub async fn find_page(&self, page_id: PageId) -> AppResult<Option<Page>> {
        self.store.find_page(page_id).await
    }

    /// Pending → Crawling, Crawling → Crawling for a reclaimed job, or
    /// Failed → Crawling for a retried one.
    pub async fn begin_crawl(&self, page_id: PageId, audit_id: AuditId) -> AppResult<bool> {
        let moved = self
            .store
            .transition_page(page_id, PageStatus::Crawling)
            .await?;
        if moved {
            self.recompute(audit_id).await?;
        }
        Ok(moved)
    }

    /// Crawling → Analyzing with the crawl output and the follow-up
    /// analysis job, in one write.
    pub async fn finish_crawl(
        &self,
        page_id: PageId,
        audit_id: AuditId,
        content: &FetchedContent,
        analyze_job: &CreateJob,
    ) -> AppResult<bool> {
        let moved = self
            .store
            .complete_crawl(page_id, content, analyze_job)
            .await?;
        if moved {
            debug!(page_id = %page_id, "Page crawled");
            self.recompute(audit_id).await?;
        }
        Ok(moved)
    }

    /// Analyzing → Analyzing when an analysis job is claimed, or
    /// Failed → Analyzing when it is retried.
    pub async fn begin_analysis(&self, page_id: PageId, audit_id: AuditId) -> AppResult<bool> {
        let moved = self
            .store
            .transition_page(page_id, PageStatus::Analyzing)
            .await?;
        if moved {
            self.recompute(audit_id).await?;
        }
        Ok(moved)
    }

    /// Analyzing → Completed with the score and issues, in one write.
    pub async fn finish_analysis(
        &self,
        page_id: PageId,
        audit_id: AuditId,
        analysis: &ContentAnalysis,
    ) -> AppResult<bool> {
        let moved = self.store.complete_analysis(page_id, analysis).await?;
        if moved {
            debug!(
                page_id = %page_id,
                quality_score = analysis.quality_score,
                issues = analysis.issues.len(),
                "Page analyzed"
            );
            self.recompute(audit_id).await?;
        }
        Ok(moved)
    }

    /// Crawling or Analyzing → Failed.
    pub async fn fail_page(&self, page_id: PageId, audit_id: AuditId, error: &str) -> AppResult<bool> {
        let moved = self.store.fail_page(page_id, error).await?;
        if moved {
            info!(page_id = %page_id, audit_id = %audit_id, error, "Page failed");
            self.recompute(audit_id).await?;
        }
        Ok(moved)
    }

    /// Re-derive the audit status from its pages and store it.
    ///
    /// The write is conditional on the status that was read. When another
    /// recompute moved the audit in between, the audit and its counts are
    /// read again and the derivation repeated, until a write sticks or
    /// nothing is left to change. Audit status only moves forward, so the
    /// loop ends. Returns the new status when this call changed it.
    pub async fn recompute(&self, audit_id: AuditId) -> AppResult<Option<AuditStatus>> {
        loop {
            let Some(audit) = self.store.find_audit(audit_id).await? else {
                return Ok(None);
            };

            let counts = self.store.count_pages_by_status(audit_id).await?;
            let Some(next) = derive_audit_status(audit.status, &counts) else {
                return Ok(None);
            };

            if self
                .store
                .update_audit_status(audit_id, &[audit.status], next)
                .await?
            {
                info!(audit_id = %audit_id, from = %audit.status, to = %next, "Audit status changed");
                return Ok(Some(next));
            }
            debug!(audit_id = %audit_id, "Audit status moved concurrently, deriving again");
        }
    }
}
