//! Audit orchestration and read paths.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use siteaudit_core::config::PipelineConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::SitemapResolver;
use siteaudit_core::types::{AuditId, UserId};
use siteaudit_database::AuditStore;
use siteaudit_entity::audit::{Audit, AuditProgress, CreateAudit};
use siteaudit_entity::page::Page;

use super::export::render_csv;

/// Largest page of audits returned by [`AuditService::list_audits`].
const MAX_LIST_LIMIT: i64 = 100;

/// Request to start a new audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartAuditRequest {
    /// Sitemap to resolve.
    pub sitemap_url: String,
    /// Submitting user.
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Delay between crawl requests; the configured default when absent.
    #[serde(default)]
    pub rate_limit_ms: Option<i64>,
    /// Keep only the first `url_limit` URLs.
    #[serde(default)]
    pub url_limit: Option<i32>,
}

impl StartAuditRequest {
    /// Request for `sitemap_url` with every option left at its default.
    pub fn new(sitemap_url: impl Into<String>) -> Self {
        Self {
            sitemap_url: sitemap_url.into(),
            user_id: None,
            rate_limit_ms: None,
            url_limit: None,
        }
    }
}

/// An audit together with its derived progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// The audit row.
    pub audit: Audit,
    /// Progress computed from current page counts.
    pub progress: AuditProgress,
}

/// Starts audits and answers queries about them.
#[derive(Debug, Clone)]
pub struct AuditService {
    /// Audit store.
    store: Arc<dyn AuditStore>,
    /// Sitemap resolver.
    resolver: Arc<dyn SitemapResolver>,
    /// Pipeline defaults.
    pipeline: PipelineConfig,
    /// Claim ceiling for seeded crawl jobs.
    max_attempts: i32,
}

impl AuditService {
    /// Creates a new audit service.
    pub fn new(
        store: Arc<dyn AuditStore>,
        resolver: Arc<dyn SitemapResolver>,
        pipeline: PipelineConfig,
        max_attempts: i32,
    ) -> Self {
        Self {
            store,
            resolver,
            pipeline,
            max_attempts,
        }
    }

    /// Resolve the sitemap, create the audit and seed its pages and crawl
    /// jobs. Nothing is written when validation or resolution fails.
    pub async fn start_audit(&self, req: StartAuditRequest) -> AppResult<Audit> {
        let rate_limit_ms = req.rate_limit_ms.unwrap_or(self.pipeline.default_rate_limit_ms);
        validate_request(&req, rate_limit_ms)?;

        let mut urls = self.resolver.resolve(&req.sitemap_url).await?;
        if urls.is_empty() {
            return Err(AppError::validation(format!(
                "Sitemap {} lists no URLs",
                req.sitemap_url
            )));
        }

        let resolved = urls.len();
        if let Some(limit) = req.url_limit {
            urls.truncate(limit as usize);
        }
        if let Some(max) = self.pipeline.max_urls_per_audit {
            if urls.len() > max {
                warn!(
                    sitemap_url = %req.sitemap_url,
                    requested = urls.len(),
                    max,
                    "Audit capped at configured page limit"
                );
                urls.truncate(max);
            }
        }

        let audit = self
            .store
            .create_audit(&CreateAudit {
                user_id: req.user_id,
                sitemap_url: req.sitemap_url.clone(),
                total_urls: urls.len() as i32,
                rate_limit_ms,
                url_limit: req.url_limit,
            })
            .await?;

        self.store
            .seed_pages(&audit, &urls, self.max_attempts)
            .await?;

        info!(
            audit_id = %audit.id,
            sitemap_url = %audit.sitemap_url,
            resolved,
            pages = urls.len(),
            rate_limit_ms,
            "Audit started"
        );

        self.store
            .find_audit(audit.id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Audit {} not found", audit.id)))
    }

    /// The audit with its progress. NotFound when the id is unknown.
    pub async fn get_audit_progress(&self, audit_id: AuditId) -> AppResult<AuditReport> {
        let audit = self.require_audit(audit_id).await?;
        let counts = self.store.count_pages_by_status(audit_id).await?;
        let progress = AuditProgress::compute(i64::from(audit.total_urls), counts);
        Ok(AuditReport { audit, progress })
    }

    /// Render the audit's pages and issues as CSV.
    pub async fn generate_csv_export(&self, audit_id: AuditId) -> AppResult<String> {
        self.require_audit(audit_id).await?;
        let pages = self.store.list_pages(audit_id).await?;
        let issues = self.store.list_issues_for_audit(audit_id).await?;
        Ok(render_csv(&pages, &issues))
    }

    /// Delete an audit with its pages, issues and unfinished jobs.
    pub async fn delete_audit(&self, audit_id: AuditId) -> AppResult<()> {
        if !self.store.delete_audit(audit_id).await? {
            return Err(AppError::not_found(format!("Audit {audit_id} not found")));
        }
        info!(audit_id = %audit_id, "Audit deleted");
        Ok(())
    }

    /// Most recent audits first, at most 100.
    pub async fn list_audits(&self, limit: i64) -> AppResult<Vec<Audit>> {
        self.store
            .list_audits(limit.clamp(1, MAX_LIST_LIMIT))
            .await
    }

    /// Pages of an audit in sitemap order.
    pub async fn list_pages(&self, audit_id: AuditId) -> AppResult<Vec<Page>> {
        self.require_audit(audit_id).await?;
        self.store.list_pages(audit_id).await
    }

    async fn require_audit(&self, audit_id: AuditId) -> AppResult<Audit> {
        self.store
            .find_audit(audit_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Audit {audit_id} not found")))
    }
}

fn validate_request(req: &StartAuditRequest, rate_limit_ms: i64) -> AppResult<()> {
    let parsed = Url::parse(&req.sitemap_url)
        .map_err(|e| AppError::validation(format!("Invalid sitemap URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::validation(format!(
            "Sitemap URL must use http or https, got {}",
            parsed.scheme()
        )));
    }
    if let Some(limit) = req.url_limit {
        if limit <= 0 {
            return Err(AppError::validation("url_limit must be positive"));
        }
    }
    if rate_limit_ms < 0 {
        return Err(AppError::validation("rate_limit_ms must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use siteaudit_core::error::ErrorKind;
    use siteaudit_database::{JobStore, MemoryStore};
    use siteaudit_entity::audit::AuditStatus;
    use siteaudit_entity::job::JobPayload;

    #[derive(Debug)]
    struct FixedSitemap {
        urls: Vec<String>,
        calls: AtomicUsize,
    }

    impl FixedSitemap {
        fn with(count: usize) -> Arc<Self> {
            Arc::new(Self {
                urls: (0..count)
                    .map(|i| format!("https://example.com/page-{i}"))
                    .collect(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SitemapResolver for FixedSitemap {
        async fn resolve(&self, _sitemap_url: &str) -> AppResult<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.urls.clone())
        }
    }

    fn service(store: &Arc<MemoryStore>, resolver: Arc<FixedSitemap>) -> AuditService {
        AuditService::new(store.clone(), resolver, PipelineConfig::default(), 3)
    }

    #[tokio::test]
    async fn test_url_limit_keeps_first_urls_in_order() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store, FixedSitemap::with(100));

        let mut req = StartAuditRequest::new("https://example.com/sitemap.xml");
        req.url_limit = Some(10);
        let audit = svc.start_audit(req).await.expect("start");

        assert_eq!(audit.total_urls, 10);
        assert_eq!(audit.status, AuditStatus::Crawling);
        assert_eq!(audit.rate_limit_ms, 1_000);

        let pages = svc.list_pages(audit.id).await.expect("pages");
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        let expected: Vec<String> = (0..10).map(|i| format!("https://example.com/page-{i}")).collect();
        assert_eq!(urls, expected);

        assert_eq!(
            store
                .count_by_status(siteaudit_entity::job::JobStatus::Pending)
                .await
                .expect("count"),
            10
        );
        let first = store
            .claim_next(std::time::Duration::from_secs(300))
            .await
            .expect("claim")
            .expect("job");
        match first.decode_payload().expect("payload") {
            JobPayload::CrawlPage(p) => {
                assert_eq!(p.url, "https://example.com/page-0");
                assert_eq!(p.rate_limit_ms, 1_000);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_input_rejected_before_resolving() {
        let store = Arc::new(MemoryStore::new());
        let resolver = FixedSitemap::with(3);
        let svc = service(&store, resolver.clone());

        for req in [
            StartAuditRequest::new("not a url"),
            StartAuditRequest::new("ftp://example.com/sitemap.xml"),
            StartAuditRequest {
                url_limit: Some(0),
                ..StartAuditRequest::new("https://example.com/sitemap.xml")
            },
            StartAuditRequest {
                rate_limit_ms: Some(-5),
                ..StartAuditRequest::new("https://example.com/sitemap.xml")
            },
        ] {
            let err = svc.start_audit(req).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
        assert!(svc.list_audits(10).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_empty_sitemap_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store, FixedSitemap::with(0));

        let err = svc
            .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(svc.list_audits(10).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn test_progress_of_fresh_audit() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store, FixedSitemap::with(4));
        let audit = svc
            .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
            .await
            .expect("start");

        let report = svc.get_audit_progress(audit.id).await.expect("progress");
        assert_eq!(report.progress.total, 4);
        assert_eq!(report.progress.pending, 4);
        assert_eq!(report.progress.percentage, 0);
    }

    #[tokio::test]
    async fn test_unknown_audit_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store, FixedSitemap::with(1));
        let id = AuditId::new();

        assert_eq!(svc.get_audit_progress(id).await.unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(svc.generate_csv_export(id).await.unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(svc.delete_audit(id).await.unwrap_err().kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_export_lists_every_page() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store, FixedSitemap::with(2));
        let audit = svc
            .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
            .await
            .expect("start");

        let csv = svc.generate_csv_export(audit.id).await.expect("csv");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "https://example.com/page-0,,0,,,");

        svc.delete_audit(audit.id).await.expect("delete");
        assert!(svc.list_audits(10).await.expect("list").is_empty());
    }
}
