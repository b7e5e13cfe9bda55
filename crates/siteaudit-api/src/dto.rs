//! Request and response DTOs.

use serde::{Deserialize, Serialize};

use siteaudit_core::types::UserId;
use siteaudit_service::StartAuditRequest;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Body of `POST /api/audits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuditRequest {
    /// Sitemap to audit.
    pub sitemap_url: String,
    /// Submitting user.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Delay between crawl requests in milliseconds.
    #[serde(default)]
    pub rate_limit_ms: Option<i64>,
    /// Keep only the first `url_limit` URLs of the sitemap.
    #[serde(default)]
    pub url_limit: Option<i32>,
}

impl From<CreateAuditRequest> for StartAuditRequest {
    fn from(req: CreateAuditRequest) -> Self {
        Self {
            sitemap_url: req.sitemap_url,
            user_id: req.user_id,
            rate_limit_ms: req.rate_limit_ms,
            url_limit: req.url_limit,
        }
    }
}

/// Query string of `GET /api/audits`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAuditsQuery {
    /// Maximum number of audits returned.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// Health response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// `"connected"`, `"unreachable"` or `"memory"`.
    pub database: String,
}
