//! Periodic repair of pages that lost their job.
//!
//! Two situations leave a page without a live job: a Pending page whose
//! crawl job never made it into the queue (or was given up before the crawl
//! started), and a Crawling or Analyzing page whose job ran out of claims
//! while its lock was expiring. The first is re-enqueued, the second failed.
//! Each sweep then re-derives the status of every unfinished audit, which
//! settles audits whose last job gave up without a worker left to say so.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use siteaudit_core::config::WorkerConfig;
use siteaudit_core::result::AppResult;
use siteaudit_core::types::AuditId;
use siteaudit_database::AuditStore;
use siteaudit_entity::job::{CrawlPagePayload, JobPayload};
use siteaudit_service::AuditProgression;

use crate::queue::JobQueue;

/// Error recorded on a page whose job gave up while the worker was gone.
const STRANDED_ERROR: &str = "Job attempts exhausted without a result";

/// What one sweep changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Crawl jobs enqueued for orphaned Pending pages.
    pub requeued: usize,
    /// Stranded pages moved to Failed.
    pub failed: usize,
    /// Audits whose status the sweep moved.
    pub advanced: usize,
}

/// Sweeps the store for pages without a live job.
#[derive(Debug)]
pub struct Reconciler {
    /// Audit store.
    store: Arc<dyn AuditStore>,
    /// Queue for re-enqueued crawls.
    queue: Arc<JobQueue>,
    /// State transitions for stranded pages.
    progression: AuditProgression,
    /// Sweep interval.
    interval: Duration,
    /// Minimum age of an orphan.
    orphan_grace: chrono::Duration,
    /// Claim ceiling for re-enqueued jobs.
    max_attempts: i32,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        store: Arc<dyn AuditStore>,
        queue: Arc<JobQueue>,
        progression: AuditProgression,
        config: &WorkerConfig,
    ) -> Self {
        let orphan_grace = chrono::Duration::seconds(
            i64::try_from(config.orphan_grace_seconds).unwrap_or(i64::MAX / 1_000),
        );
        Self {
            store,
            queue,
            progression,
            interval: Duration::from_secs(config.reconcile_interval_seconds),
            orphan_grace,
            max_attempts: config.max_attempts,
        }
    }

    /// Sweep on every interval until cancelled. A zero interval disables it.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        if self.interval.is_zero() {
            info!("Reconciler disabled");
            return;
        }
        info!(interval_seconds = self.interval.as_secs(), "Reconciler started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Reconciliation sweep failed");
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Reconciler stopped");
    }

    /// Run one sweep against the current time.
    pub async fn sweep(&self) -> AppResult<ReconcileReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep as if the current time were `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> AppResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let orphans = self.store.find_orphan_pages(now - self.orphan_grace).await?;
        let mut rate_limits: HashMap<AuditId, i64> = HashMap::new();
        for page in orphans {
            let rate_limit_ms = match rate_limits.get(&page.audit_id) {
                Some(ms) => *ms,
                None => {
                    let Some(audit) = self.store.find_audit(page.audit_id).await? else {
                        continue;
                    };
                    rate_limits.insert(audit.id, audit.rate_limit_ms);
                    audit.rate_limit_ms
                }
            };

            let payload = JobPayload::CrawlPage(CrawlPagePayload {
                audit_id: page.audit_id,
                page_id: page.id,
                url: page.url.clone(),
                rate_limit_ms,
            });
            let job = self.queue.enqueue(&payload, self.max_attempts).await?;
            debug!(page_id = %page.id, job_id = %job.id, "Re-enqueued crawl for orphaned page");
            report.requeued += 1;
        }

        for page in self.store.find_stranded_pages().await? {
            if self
                .progression
                .fail_page(page.id, page.audit_id, STRANDED_ERROR)
                .await?
            {
                report.failed += 1;
            }
        }

        for audit in self.store.list_unfinished_audits().await? {
            if self.progression.recompute(audit.id).await?.is_some() {
                report.advanced += 1;
            }
        }

        if report != ReconcileReport::default() {
            info!(
                requeued = report.requeued,
                failed = report.failed,
                advanced = report.advanced,
                "Reconciliation sweep repaired pages"
            );
        }
        Ok(report)
    }
}
