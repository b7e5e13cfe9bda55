//! Crawl job handler: fetch a page and hand it to analysis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use siteaudit_core::result::AppResult;
use siteaudit_core::traits::ContentFetcher;
use siteaudit_entity::job::{AnalyzePagePayload, CreateJob, JobPayload, JobType};
use siteaudit_service::AuditProgression;

use super::{settle_exhausted, settle_failure};
use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::ClaimedJob;

/// Handles `crawl_page` jobs.
///
/// The worker pool holds the audit's crawl permit for the whole call, so
/// the rate-limit delay below spaces out the audit's requests.
#[derive(Debug)]
pub struct CrawlPageHandler {
    /// Page and audit state transitions.
    progression: AuditProgression,
    /// Page fetcher.
    fetcher: Arc<dyn ContentFetcher>,
    /// Claim ceiling for the follow-up analysis job.
    max_attempts: i32,
}

impl CrawlPageHandler {
    /// Create a new crawl handler.
    pub fn new(
        progression: AuditProgression,
        fetcher: Arc<dyn ContentFetcher>,
        max_attempts: i32,
    ) -> Self {
        Self {
            progression,
            fetcher,
            max_attempts,
        }
    }
}

#[async_trait]
impl JobHandler for CrawlPageHandler {
    fn job_type(&self) -> JobType {
        JobType::CrawlPage
    }

    async fn execute(&self, job: &ClaimedJob) -> Result<(), JobExecutionError> {
        let JobPayload::CrawlPage(payload) = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Crawl handler received a {} job",
                job.payload.job_type()
            )));
        };

        if !self
            .progression
            .begin_crawl(payload.page_id, payload.audit_id)
            .await?
        {
            debug!(page_id = %payload.page_id, "Page is past crawling or gone, skipping");
            return Ok(());
        }

        if payload.rate_limit_ms > 0 {
            tokio::time::sleep(Duration::from_millis(payload.rate_limit_ms as u64)).await;
        }

        let content = match self.fetcher.fetch(&payload.url).await {
            Ok(content) => content,
            Err(err) => {
                warn!(
                    page_id = %payload.page_id,
                    url = %payload.url,
                    attempt = job.job.attempts,
                    error = %err,
                    "Crawl failed"
                );
                return Err(settle_failure(&self.progression, job, err).await);
            }
        };

        let analyze = CreateJob::from_payload(
            &JobPayload::AnalyzePage(AnalyzePagePayload {
                audit_id: payload.audit_id,
                page_id: payload.page_id,
                url: payload.url.clone(),
            }),
            self.max_attempts,
        )?;

        let moved = self
            .progression
            .finish_crawl(payload.page_id, payload.audit_id, &content, &analyze)
            .await?;
        if moved {
            info!(
                audit_id = %payload.audit_id,
                page_id = %payload.page_id,
                url = %payload.url,
                chars = content.content.len(),
                "Page crawled"
            );
        } else {
            debug!(page_id = %payload.page_id, "Page left crawling concurrently");
        }
        Ok(())
    }

    async fn on_exhausted(&self, job: &ClaimedJob) -> AppResult<()> {
        settle_exhausted(&self.progression, job).await
    }
}
