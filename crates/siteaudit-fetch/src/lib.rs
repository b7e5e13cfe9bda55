//! # siteaudit-fetch
//!
//! Network-facing implementations of the collaborator traits declared in
//! `siteaudit-core`: sitemap resolution, page text extraction and the
//! LLM-backed content analyzer.

pub mod analyzer;
pub mod client;
pub mod fetcher;
pub mod sitemap;

pub use analyzer::LlmContentAnalyzer;
pub use fetcher::HtmlContentFetcher;
pub use sitemap::HttpSitemapResolver;
