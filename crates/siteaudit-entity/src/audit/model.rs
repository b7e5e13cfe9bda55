//! Audit entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use siteaudit_core::types::{AuditId, UserId};

use super::status::AuditStatus;

/// One end-to-end run over a sitemap.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Audit {
    /// Unique audit identifier.
    pub id: AuditId,
    /// Submitting user, if known.
    pub user_id: Option<UserId>,
    /// The sitemap that was resolved.
    pub sitemap_url: String,
    /// Current audit status.
    pub status: AuditStatus,
    /// Number of pages, fixed at creation.
    pub total_urls: i32,
    /// Number of successful analyses so far.
    pub processed_urls: i32,
    /// Minimum delay between crawl requests for this audit.
    pub rate_limit_ms: i64,
    /// Cap applied to the sitemap's URL list.
    pub url_limit: Option<i32>,
    /// When the audit was created.
    pub created_at: DateTime<Utc>,
    /// When the audit row last changed.
    pub updated_at: DateTime<Utc>,
    /// When the audit reached Completed.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Data required to create a new audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAudit {
    /// Submitting user.
    pub user_id: Option<UserId>,
    /// Sitemap URL.
    pub sitemap_url: String,
    /// Number of pages after truncation.
    pub total_urls: i32,
    /// Crawl delay in milliseconds.
    pub rate_limit_ms: i64,
    /// Requested URL cap.
    pub url_limit: Option<i32>,
}
