//! # siteaudit-core
//!
//! Core crate for SiteAudit. Contains configuration schemas, typed
//! identifiers, the collaborator traits used by the crawl/analyze
//! pipeline, and the unified error system.
//!
//! This crate has **no** internal dependencies on other SiteAudit crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
