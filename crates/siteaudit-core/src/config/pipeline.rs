//! Audit pipeline defaults.

use serde::{Deserialize, Serialize};

/// Defaults applied when an audit is started without explicit values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum delay between two crawl requests of the same audit.
    #[serde(default = "default_rate_limit")]
    pub default_rate_limit_ms: i64,
    /// Hard upper bound on pages per audit, applied after `url_limit`.
    #[serde(default)]
    pub max_urls_per_audit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_rate_limit_ms: default_rate_limit(),
            max_urls_per_audit: None,
        }
    }
}

fn default_rate_limit() -> i64 {
    1_000
}
