//! Audit run entities.

pub mod model;
pub mod progress;
pub mod status;

pub use model::{Audit, CreateAudit};
pub use progress::{AuditProgress, PageStatusCounts};
pub use status::AuditStatus;
