//! Analysis job handler: score a crawled page and store its issues.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use siteaudit_core::result::AppResult;
use siteaudit_core::traits::ContentAnalyzer;
use siteaudit_entity::job::{JobPayload, JobType};
use siteaudit_service::AuditProgression;

use super::{settle_exhausted, settle_failure};
use crate::executor::{JobExecutionError, JobHandler};
use crate::queue::ClaimedJob;

/// Handles `analyze_page` jobs.
#[derive(Debug)]
pub struct AnalyzePageHandler {
    /// Page and audit state transitions.
    progression: AuditProgression,
    /// Content analyzer.
    analyzer: Arc<dyn ContentAnalyzer>,
}

impl AnalyzePageHandler {
    /// Create a new analysis handler.
    pub fn new(progression: AuditProgression, analyzer: Arc<dyn ContentAnalyzer>) -> Self {
        Self {
            progression,
            analyzer,
        }
    }
}

#[async_trait]
impl JobHandler for AnalyzePageHandler {
    fn job_type(&self) -> JobType {
        JobType::AnalyzePage
    }

    async fn execute(&self, job: &ClaimedJob) -> Result<(), JobExecutionError> {
        let JobPayload::AnalyzePage(payload) = &job.payload else {
            return Err(JobExecutionError::Permanent(format!(
                "Analysis handler received a {} job",
                job.payload.job_type()
            )));
        };

        if !self
            .progression
            .begin_analysis(payload.page_id, payload.audit_id)
            .await?
        {
            debug!(page_id = %payload.page_id, "Page is not awaiting analysis, skipping");
            return Ok(());
        }

        let Some(page) = self.progression.find_page(payload.page_id).await? else {
            return Ok(());
        };
        let content = page.content.as_deref().unwrap_or_default();

        let mut analysis = match self.analyzer.analyze(page.title.as_deref(), content).await {
            Ok(analysis) => analysis,
            Err(err) => {
                warn!(
                    page_id = %payload.page_id,
                    attempt = job.job.attempts,
                    error = %err,
                    "Analysis failed"
                );
                return Err(settle_failure(&self.progression, job, err).await);
            }
        };
        analysis.quality_score = analysis.quality_score.clamp(0, 100);

        if self
            .progression
            .finish_analysis(payload.page_id, payload.audit_id, &analysis)
            .await?
        {
            info!(
                audit_id = %payload.audit_id,
                page_id = %payload.page_id,
                quality_score = analysis.quality_score,
                issues = analysis.issues.len(),
                "Page analyzed"
            );
        }
        Ok(())
    }

    async fn on_exhausted(&self, job: &ClaimedJob) -> AppResult<()> {
        settle_exhausted(&self.progression, job).await
    }
}
