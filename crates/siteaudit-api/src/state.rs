//! Application state shared across all handlers.

use std::sync::Arc;

use siteaudit_database::DatabasePool;
use siteaudit_service::{AuditService, QueueService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Audit orchestration and read paths.
    pub audit_service: Arc<AuditService>,
    /// Queue statistics.
    pub queue_service: Arc<QueueService>,
    /// PostgreSQL pool, absent when running on the in-memory store.
    pub db_pool: Option<DatabasePool>,
}

impl AppState {
    /// Creates a new state.
    pub fn new(
        audit_service: Arc<AuditService>,
        queue_service: Arc<QueueService>,
        db_pool: Option<DatabasePool>,
    ) -> Self {
        Self {
            audit_service,
            queue_service,
            db_pool,
        }
    }
}
