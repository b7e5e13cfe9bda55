//! Audit lifecycle: orchestration, state progression and export.

pub mod export;
pub mod progression;
pub mod service;

pub use export::render_csv;
pub use progression::{AuditProgression, derive_audit_status};
pub use service::{AuditReport, AuditService, StartAuditRequest};
