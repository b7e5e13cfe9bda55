//! Audit status enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "audit_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Created, pages not yet seeded.
    Pending,
    /// Pages seeded; crawls in progress.
    Crawling,
    /// No crawl in flight; analyses in progress.
    Analyzing,
    /// Every page reached Completed or Failed.
    Completed,
    /// Marked failed by an operator.
    Failed,
}

impl AuditStatus {
    /// Terminal audits are never mutated again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Crawling => "crawling",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
