//! # siteaudit-service
//!
//! Business logic for SiteAudit. [`AuditService`] starts audits and serves
//! their read paths; [`AuditProgression`] owns every page and audit status
//! change made by the workers; [`QueueService`] reports queue statistics.
//!
//! Services follow constructor injection: stores and collaborators are
//! provided at construction time via `Arc` references.

pub mod audit;
pub mod queue;

pub use audit::{
    AuditProgression, AuditReport, AuditService, StartAuditRequest, derive_audit_status,
    render_csv,
};
pub use queue::{QueueService, QueueStats};
