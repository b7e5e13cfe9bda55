//! Typed job payload definitions.
//!
//! The `job_type` column is the tag; the JSON payload holds the variant's
//! fields. Decoding checks the payload against the tag at claim time so a
//! handler never sees a payload it cannot interpret.

use serde::{Deserialize, Serialize};

use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::types::{AuditId, PageId};

use super::status::JobType;

/// Fields of a `crawl_page` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlPagePayload {
    /// Owning audit.
    pub audit_id: AuditId,
    /// Page to crawl.
    pub page_id: PageId,
    /// Page URL.
    pub url: String,
    /// Delay applied before the request, in milliseconds.
    pub rate_limit_ms: i64,
}

/// Fields of an `analyze_page` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzePagePayload {
    /// Owning audit.
    pub audit_id: AuditId,
    /// Page to analyze.
    pub page_id: PageId,
    /// Page URL, for logging.
    pub url: String,
}

/// Payload of a job, keyed by job type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    /// Crawl one page.
    CrawlPage(CrawlPagePayload),
    /// Analyze one page.
    AnalyzePage(AnalyzePagePayload),
}

impl JobPayload {
    /// The job type this payload belongs to.
    pub fn job_type(&self) -> JobType {
        match self {
            Self::CrawlPage(_) => JobType::CrawlPage,
            Self::AnalyzePage(_) => JobType::AnalyzePage,
        }
    }

    /// Audit the job works on.
    pub fn audit_id(&self) -> AuditId {
        match self {
            Self::CrawlPage(p) => p.audit_id,
            Self::AnalyzePage(p) => p.audit_id,
        }
    }

    /// Page the job works on.
    pub fn page_id(&self) -> PageId {
        match self {
            Self::CrawlPage(p) => p.page_id,
            Self::AnalyzePage(p) => p.page_id,
        }
    }

    /// Serialize the variant's fields for storage.
    pub fn to_value(&self) -> AppResult<serde_json::Value> {
        let value = match self {
            Self::CrawlPage(p) => serde_json::to_value(p)?,
            Self::AnalyzePage(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Decode a stored payload according to its job type.
    ///
    /// Unknown extra keys (such as `last_error` merged in by a failed
    /// attempt) are ignored.
    pub fn decode(job_type: JobType, value: &serde_json::Value) -> AppResult<Self> {
        let decoded = match job_type {
            JobType::CrawlPage => {
                CrawlPagePayload::deserialize(value).map(Self::CrawlPage)
            }
            JobType::AnalyzePage => {
                AnalyzePagePayload::deserialize(value).map(Self::AnalyzePage)
            }
        };
        decoded.map_err(|e| {
            AppError::with_source(
                siteaudit_core::error::ErrorKind::Serialization,
                format!("Malformed {job_type} payload: {e}"),
                e,
            )
        })
    }
}
