//! Convenience result type alias for SiteAudit.

use crate::error::AppError;

/// A specialized `Result` type for SiteAudit operations.
pub type AppResult<T> = Result<T, AppError>;
