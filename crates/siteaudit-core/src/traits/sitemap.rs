//! Sitemap resolution contract.

use async_trait::async_trait;

use crate::result::AppResult;

/// Turns a sitemap URL into the ordered list of page URLs it lists.
#[async_trait]
pub trait SitemapResolver: Send + Sync + std::fmt::Debug {
    /// Resolve the sitemap, recursing through sitemap indexes.
    ///
    /// The returned order is the document order; callers rely on it for
    /// truncation. Fails with a domain error when the document is
    /// malformed or lists no URLs.
    async fn resolve(&self, sitemap_url: &str) -> AppResult<Vec<String>>;
}
