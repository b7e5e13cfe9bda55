//! Content quality analysis contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::issue::{IssueSeverity, IssueType};

/// One problem reported by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedIssue {
    /// Issue classification.
    pub issue_type: IssueType,
    /// Issue severity.
    pub severity: IssueSeverity,
    /// What is wrong.
    pub description: String,
    /// The offending excerpt.
    pub snippet: String,
    /// Suggested rewrite, if any.
    pub suggestion: Option<String>,
}

/// Result of analyzing one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentAnalysis {
    /// Quality score in `0..=100`.
    pub quality_score: i32,
    /// Issues found, possibly empty.
    pub issues: Vec<DetectedIssue>,
}

/// Scores page text and lists its problems.
#[async_trait]
pub trait ContentAnalyzer: Send + Sync + std::fmt::Debug {
    /// Analyze a page. Fails when the model output cannot be interpreted.
    async fn analyze(&self, title: Option<&str>, content: &str) -> AppResult<ContentAnalysis>;
}
