//! Shared value types.

pub mod id;
pub mod issue;

pub use id::{AuditId, IssueId, JobId, PageId, UserId};
pub use issue::{IssueSeverity, IssueType};
