//! Page entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use siteaudit_core::types::{AuditId, PageId};

use super::status::PageStatus;

/// One URL within an audit.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Page {
    /// Unique page identifier.
    pub id: PageId,
    /// Owning audit.
    pub audit_id: AuditId,
    /// Page URL.
    pub url: String,
    /// Zero-based index in the resolved sitemap order.
    pub position: i32,
    /// Current page status.
    pub status: PageStatus,
    /// Document title, set by the crawl.
    pub title: Option<String>,
    /// Extracted text, set by the crawl.
    pub content: Option<String>,
    /// Quality score in `0..=100`, set by the analysis.
    pub quality_score: Option<i32>,
    /// Last crawl or analysis error.
    pub error_message: Option<String>,
    /// When the page was seeded.
    pub created_at: DateTime<Utc>,
    /// When the analysis completed.
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Page {
    /// Whether the page may move to `to` now.
    ///
    /// On top of the status rules, a Failed page re-enters only the stage it
    /// failed in: Crawling while no crawl output is stored, Analyzing once
    /// it is.
    pub fn can_resume(&self, to: PageStatus) -> bool {
        if !self.status.can_transition_to(to) {
            return false;
        }
        match (self.status, to) {
            (PageStatus::Failed, PageStatus::Crawling) => self.content.is_none(),
            (PageStatus::Failed, PageStatus::Analyzing) => self.content.is_some(),
            _ => true,
        }
    }
}
