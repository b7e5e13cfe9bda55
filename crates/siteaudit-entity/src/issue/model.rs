//! Issue entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use siteaudit_core::types::{IssueId, IssueSeverity, IssueType, PageId};

/// A quality problem detected on a page. Immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Issue {
    /// Unique issue identifier.
    pub id: IssueId,
    /// Owning page.
    pub page_id: PageId,
    /// Issue classification.
    pub issue_type: IssueType,
    /// Issue severity.
    pub severity: IssueSeverity,
    /// What is wrong.
    pub description: String,
    /// The offending excerpt.
    pub snippet: String,
    /// Suggested rewrite.
    pub suggestion: Option<String>,
    /// When the issue was recorded.
    pub created_at: DateTime<Utc>,
}
