//! Collaborator traits consumed by the audit pipeline.
//!
//! The pipeline never talks to the network directly; it goes through
//! these seams so tests and alternative deployments can swap them.

pub mod analyzer;
pub mod fetcher;
pub mod sitemap;

pub use analyzer::{ContentAnalysis, ContentAnalyzer, DetectedIssue};
pub use fetcher::{ContentFetcher, FetchedContent};
pub use sitemap::SitemapResolver;
