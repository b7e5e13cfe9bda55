//! Sitemap, page fetching and analyzer configuration.

use serde::{Deserialize, Serialize};

/// HTTP settings shared by the sitemap resolver and the content fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Maximum nesting of sitemap indexes followed.
    #[serde(default = "default_max_sitemap_depth")]
    pub max_sitemap_depth: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: default_timeout(),
            max_sitemap_depth: default_max_sitemap_depth(),
        }
    }
}

/// OpenAI-compatible chat completion settings for the content analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Base URL of the chat completions API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API key. Usually provided via `SITEAUDIT__ANALYZER__API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Content is truncated to this many characters before analysis.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Per-request timeout in seconds.
    #[serde(default = "default_analyzer_timeout")]
    pub timeout_seconds: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            api_key: String::new(),
            model: default_model(),
            max_content_chars: default_max_content_chars(),
            timeout_seconds: default_analyzer_timeout(),
        }
    }
}

fn default_user_agent() -> String {
    format!("siteaudit/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout() -> u64 {
    30
}

fn default_max_sitemap_depth() -> usize {
    3
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_content_chars() -> usize {
    12_000
}

fn default_analyzer_timeout() -> u64 {
    90
}
