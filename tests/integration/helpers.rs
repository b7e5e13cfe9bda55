//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use siteaudit_api::{Application, Collaborators, Stores};
use siteaudit_core::config::{AppConfig, DatabaseBackend};
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{
    ContentAnalysis, ContentAnalyzer, ContentFetcher, DetectedIssue, FetchedContent,
    SitemapResolver,
};
use siteaudit_core::types::AuditId;
use siteaudit_core::types::issue::{IssueSeverity, IssueType};
use siteaudit_database::MemoryStore;
use siteaudit_entity::audit::AuditStatus;
use siteaudit_service::AuditReport;

/// Sitemap resolver returning a fixed list of URLs.
#[derive(Debug, Default)]
pub struct FixedSitemap {
    urls: Vec<String>,
}

impl FixedSitemap {
    pub fn new(urls: Vec<String>) -> Self {
        Self { urls }
    }
}

#[async_trait]
impl SitemapResolver for FixedSitemap {
    async fn resolve(&self, _sitemap_url: &str) -> AppResult<Vec<String>> {
        if self.urls.is_empty() {
            return Err(AppError::validation("Sitemap lists no URLs"));
        }
        Ok(self.urls.clone())
    }
}

/// Fetcher that records how many fetches overlap and fails on request.
#[derive(Debug, Default)]
pub struct FakeFetcher {
    delay: Duration,
    failures: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Fail the next `times` fetches of `url`.
    pub fn fail_times(self, url: &str, times: usize) -> Self {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(url.to_string(), times);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> AppResult<FetchedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fail = {
            let mut failures = self.failures.lock().expect("failures lock");
            match failures.get_mut(url) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(AppError::external_service(format!("HTTP 503 for {url}")));
        }

        let body = if url.contains("draft") {
            format!("TODO: write copy, \"soon\" for {url}")
        } else {
            format!("Welcome to {url}")
        };
        Ok(FetchedContent {
            title: Some(format!("Title of {url}")),
            content: body,
        })
    }
}

/// Analyzer flagging placeholder text and scoring everything else 90.
#[derive(Debug, Default)]
pub struct FakeAnalyzer;

#[async_trait]
impl ContentAnalyzer for FakeAnalyzer {
    async fn analyze(&self, _title: Option<&str>, content: &str) -> AppResult<ContentAnalysis> {
        if content.starts_with("TODO") {
            return Ok(ContentAnalysis {
                quality_score: 20,
                issues: vec![DetectedIssue {
                    issue_type: IssueType::Placeholder,
                    severity: IssueSeverity::High,
                    description: "Template text left in place".to_string(),
                    snippet: "TODO: write copy, \"soon\"".to_string(),
                    suggestion: Some("Write the section".to_string()),
                }],
            });
        }
        Ok(ContentAnalysis {
            quality_score: 90,
            issues: Vec::new(),
        })
    }
}

/// `count` page URLs under one host.
pub fn page_urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://example.com/page-{i}"))
        .collect()
}

/// Configuration with short intervals and no rate limit.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.database.backend = DatabaseBackend::Memory;
    config.worker.worker_count = 3;
    config.worker.poll_interval_ms = 10;
    config.worker.error_backoff_ms = 10;
    config.worker.crawl_gate_poll_ms = 5;
    config.worker.reconcile_interval_seconds = 0;
    config.worker.max_attempts = 3;
    config.pipeline.default_rate_limit_ms = 0;
    config
}

/// Test application context
pub struct TestApp {
    /// The wired application
    pub app: Application,
    /// Backing store for direct inspection
    pub store: Arc<MemoryStore>,
    /// The fake fetcher, for concurrency and call counts
    pub fetcher: Arc<FakeFetcher>,
    /// The HTTP router
    pub router: Router,
}

impl TestApp {
    /// Create a test application over an in-memory store.
    pub fn new(urls: Vec<String>, fetcher: FakeFetcher) -> Self {
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(fetcher);
        let collaborators = Collaborators {
            resolver: Arc::new(FixedSitemap::new(urls)),
            fetcher: fetcher.clone(),
            analyzer: Arc::new(FakeAnalyzer),
        };
        let app = Application::build(test_config(), Stores::memory(store.clone()), collaborators);
        let router = app.router();
        Self {
            app,
            store,
            fetcher,
            router,
        }
    }

    /// Start the worker loops in the background.
    pub fn start_workers(&self) -> RunningWorkers {
        let (cancel, rx) = watch::channel(false);
        let workers = self.app.workers();
        let handle = tokio::spawn(async move { workers.run(rx).await });
        RunningWorkers { cancel, handle }
    }

    /// Poll until the audit is Completed, panicking after `timeout`.
    pub async fn wait_for_completion(&self, audit_id: AuditId, timeout: Duration) -> AuditReport {
        let service = &self.app.state().audit_service;
        let waited = tokio::time::timeout(timeout, async {
            loop {
                let report = service
                    .get_audit_progress(audit_id)
                    .await
                    .expect("progress");
                if report.audit.status == AuditStatus::Completed {
                    return report;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        waited.expect("audit did not complete in time")
    }

    /// Send a request through the router
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let text = String::from_utf8_lossy(&body_bytes).to_string();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            content_type,
            body,
            text,
        }
    }
}

/// Handle to background worker loops.
pub struct RunningWorkers {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RunningWorkers {
    /// Signal shutdown and wait for every loop to exit.
    pub async fn stop(self) {
        let _ = self.cancel.send(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("workers did not stop")
            .expect("worker pool panicked");
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header, if any
    pub content_type: Option<String>,
    /// Parsed JSON body, `Null` when not JSON
    pub body: Value,
    /// Raw body text
    pub text: String,
}
