//! Page status enumeration and its transition rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a page. Moves forward along
/// Pending → Crawling → Analyzing → Completed. Any crawl or analysis error
/// moves the page to Failed; a retry of its job moves it back into the
/// stage it failed in, so Failed is final only once the job gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "page_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// Seeded, crawl not started.
    Pending,
    /// Crawl job claimed.
    Crawling,
    /// Crawled; analysis queued or running.
    Analyzing,
    /// Analysis persisted.
    Completed,
    /// Crawl or analysis gave up.
    Failed,
}

impl PageStatus {
    /// Statuses from which a page may move to `self`.
    ///
    /// Crawling and Analyzing accept themselves so that a reclaimed job can
    /// re-enter its stage, and Failed so that a retried job can. Which of
    /// the two a Failed page may re-enter depends on whether its crawl
    /// output is stored; see [`Page::can_resume`](super::Page::can_resume).
    /// Nothing leads back to Pending and nothing leaves Completed.
    pub fn allowed_predecessors(&self) -> &'static [PageStatus] {
        match self {
            Self::Pending => &[],
            Self::Crawling => &[Self::Pending, Self::Crawling, Self::Failed],
            Self::Analyzing => &[Self::Crawling, Self::Analyzing, Self::Failed],
            Self::Completed => &[Self::Analyzing],
            Self::Failed => &[Self::Crawling, Self::Analyzing],
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        next.allowed_predecessors().contains(self)
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

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
