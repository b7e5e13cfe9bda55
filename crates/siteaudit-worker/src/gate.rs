//! Per-audit crawl admission control.
//!
//! Crawls of one audit run one at a time so the audit's rate limit holds
//! across workers. Analysis jobs are not gated.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use siteaudit_core::types::AuditId;

/// Exclusive right to crawl for one audit. Released on drop.
pub struct CrawlPermit {
    /// Audit the permit belongs to.
    audit_id: AuditId,
    /// Runs once when the permit is dropped.
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CrawlPermit {
    /// Build a permit that calls `release` when dropped.
    pub fn new(audit_id: AuditId, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            audit_id,
            release: Some(Box::new(release)),
        }
    }

    /// Audit this permit admits crawls for.
    pub fn audit_id(&self) -> AuditId {
        self.audit_id
    }
}

impl fmt::Debug for CrawlPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlPermit")
            .field("audit_id", &self.audit_id)
            .finish()
    }
}

impl Drop for CrawlPermit {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Cooperative lock keyed by audit.
#[async_trait]
pub trait CrawlGate: Send + Sync + fmt::Debug {
    /// Take the audit's permit if nobody holds it.
    fn try_acquire(&self, audit_id: AuditId) -> Option<CrawlPermit>;

    /// Wait for the audit's permit, checking every `poll`.
    async fn acquire(&self, audit_id: AuditId, poll: Duration) -> CrawlPermit {
        loop {
            if let Some(permit) = self.try_acquire(audit_id) {
                return permit;
            }
            trace!(audit_id = %audit_id, "Crawl gate busy, waiting");
            tokio::time::sleep(poll).await;
        }
    }
}

/// Process-local crawl gate backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCrawlGate {
    /// Audits with a crawl in flight.
    held: Arc<DashMap<AuditId, ()>>,
}

impl InMemoryCrawlGate {
    /// Create an empty gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a crawl of the audit is in flight.
    pub fn is_held(&self, audit_id: AuditId) -> bool {
        self.held.contains_key(&audit_id)
    }
}

#[async_trait]
impl CrawlGate for InMemoryCrawlGate {
    fn try_acquire(&self, audit_id: AuditId) -> Option<CrawlPermit> {
        match self.held.entry(audit_id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                let held = Arc::clone(&self.held);
                Some(CrawlPermit::new(audit_id, move || {
                    held.remove(&audit_id);
                }))
            }
        }
    }
}
