//! Progress reporting derived from page status counts.
//!
//! Nothing here is persisted; progress is recomputed on every query.

use serde::{Deserialize, Serialize};

use crate::page::PageStatus;

/// Number of pages of one audit in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStatusCounts {
    /// Pages not yet crawled.
    pub pending: i64,
    /// Pages being crawled.
    pub crawling: i64,
    /// Pages crawled and awaiting or undergoing analysis.
    pub analyzing: i64,
    /// Pages analyzed.
    pub completed: i64,
    /// Pages that failed.
    pub failed: i64,
    /// Failed pages whose job is still Pending or Processing, so another
    /// attempt may move them on. Included in `failed`.
    #[serde(default)]
    pub retrying: i64,
}

impl PageStatusCounts {
    /// Tally an iterator of statuses.
    pub fn from_statuses(statuses: impl IntoIterator<Item = PageStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            counts.add(status, 1);
        }
        counts
    }

    /// Add `n` pages of `status`.
    pub fn add(&mut self, status: PageStatus, n: i64) {
        match status {
            PageStatus::Pending => self.pending += n,
            PageStatus::Crawling => self.crawling += n,
            PageStatus::Analyzing => self.analyzing += n,
            PageStatus::Completed => self.completed += n,
            PageStatus::Failed => self.failed += n,
        }
    }

    /// Sum over every status.
    pub fn total(&self) -> i64 {
        self.pending + self.crawling + self.analyzing + self.completed + self.failed
    }

    /// Whether every page reached Completed, or Failed with no attempt
    /// left to come.
    pub fn all_settled(&self) -> bool {
        self.pending == 0 && self.crawling == 0 && self.analyzing == 0 && self.retrying == 0
    }
}

/// Progress of an audit as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditProgress {
    /// Pages in the audit.
    pub total: i64,
    /// Pages analyzed.
    pub completed: i64,
    /// Pages failed.
    pub failed: i64,
    /// Pages being crawled.
    pub crawling: i64,
    /// Pages awaiting or undergoing analysis.
    pub analyzing: i64,
    /// Pages not yet crawled.
    pub pending: i64,
    /// Pages past the crawl stage (`total - pending`).
    pub crawled: i64,
    /// Overall completion, 50% crawl and 50% analysis, rounded.
    pub percentage: i64,
}

impl AuditProgress {
    /// Derive progress from the audit's page total and current counts.
    pub fn compute(total: i64, counts: PageStatusCounts) -> Self {
        let crawled = (total - counts.pending).max(0);
        let percentage = if total > 0 {
            let total_f = total as f64;
            let crawl_ratio = crawled as f64 / total_f;
            let analysis_ratio = counts.completed as f64 / total_f;
            ((crawl_ratio * 0.5 + analysis_ratio * 0.5) * 100.0).round() as i64
        } else {
            0
        };

        Self {
            total,
            completed: counts.completed,
            failed: counts.failed,
            crawling: counts.crawling,
            analyzing: counts.analyzing,
            pending: counts.pending,
            crawled,
            percentage,
        }
    }
}
