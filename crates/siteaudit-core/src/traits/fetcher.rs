//! Page content fetching contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Text extracted from a crawled page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedContent {
    /// Document title, if the page has one.
    pub title: Option<String>,
    /// Visible body text.
    pub content: String,
}

/// Downloads a page and extracts its readable text.
#[async_trait]
pub trait ContentFetcher: Send + Sync + std::fmt::Debug {
    /// Fetch `url`. Fails on a non-2xx response or when no text remains.
    async fn fetch(&self, url: &str) -> AppResult<FetchedContent>;
}
