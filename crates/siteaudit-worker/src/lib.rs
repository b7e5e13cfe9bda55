//! Background job processing for SiteAudit.
//!
//! This crate provides:
//! - A job queue facade that decodes payloads at claim time
//! - A pool of worker loops that claim, execute and settle jobs
//! - A per-audit crawl gate that keeps one crawl in flight per audit
//! - Crawl and analysis job handlers
//! - A reconciler that repairs pages left without a live job

pub mod executor;
pub mod gate;
pub mod jobs;
pub mod pool;
pub mod queue;
pub mod reconciler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use gate::{CrawlGate, CrawlPermit, InMemoryCrawlGate};
pub use jobs::{AnalyzePageHandler, CrawlPageHandler};
pub use pool::{StepOutcome, WorkerPool};
pub use queue::{ClaimedJob, JobQueue};
pub use reconciler::{ReconcileReport, Reconciler};
