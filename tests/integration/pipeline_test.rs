//! End-to-end audit pipeline tests on the in-memory store.

mod helpers;

use std::time::Duration;

use siteaudit_entity::audit::AuditStatus;
use siteaudit_entity::job::{JobStatus, JobType};
use siteaudit_entity::page::PageStatus;
use siteaudit_core::types::AuditId;
use siteaudit_service::{AuditService, StartAuditRequest};

use helpers::{FakeFetcher, TestApp, page_urls};

const WAIT: Duration = Duration::from_secs(10);

/// Poll the audit until it completes; returns the most pages seen in
/// Crawling at once.
async fn max_crawling_until_completed(service: &AuditService, audit_id: AuditId) -> i64 {
    let mut max_crawling = 0;
    let watch = async {
        loop {
            let report = service.get_audit_progress(audit_id).await.expect("progress");
            max_crawling = max_crawling.max(report.progress.crawling);
            if report.audit.status == AuditStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    };
    tokio::time::timeout(WAIT, watch).await.expect("audit completed");
    max_crawling
}

#[tokio::test]
async fn test_audit_runs_from_seed_to_export() {
    let mut urls = page_urls(3);
    urls.push("https://example.com/draft".to_string());
    let app = TestApp::new(urls, FakeFetcher::new(Duration::from_millis(1)));
    let service = app.app.state().audit_service.clone();

    let audit = service
        .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
        .await
        .expect("start");
    assert_eq!(audit.total_urls, 4);

    let workers = app.start_workers();
    let report = app.wait_for_completion(audit.id, WAIT).await;
    workers.stop().await;

    assert_eq!(report.audit.processed_urls, 4);
    assert!(report.audit.completed_at.is_some());
    assert_eq!(report.progress.completed, 4);
    assert_eq!(report.progress.failed, 0);
    assert_eq!(report.progress.percentage, 100);

    let pages = service.list_pages(audit.id).await.expect("pages");
    assert!(pages.iter().all(|p| p.status == PageStatus::Completed));
    assert!(pages.iter().all(|p| p.analyzed_at.is_some()));

    let csv = service.generate_csv_export(audit.id).await.expect("csv");
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "url,quality_score,issue_count,issues_summary,flagged_snippets,suggestions"
    );
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[1], "https://example.com/page-0,90,0,,,");
    assert_eq!(
        lines[4],
        "https://example.com/draft,20,1,placeholder/high: Template text left in place,\
         \"TODO: write copy, \"\"soon\"\"\",Write the section"
    );

    let stats = app.app.state().queue_service.stats().await.expect("stats");
    assert_eq!(stats.completed, 8, "one crawl and one analysis per page");
    assert_eq!(stats.outstanding(), 0);
}

#[tokio::test]
async fn test_crawls_of_one_audit_never_overlap() {
    let app = TestApp::new(page_urls(5), FakeFetcher::new(Duration::from_millis(25)));
    let service = app.app.state().audit_service.clone();
    let audit = service
        .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
        .await
        .expect("start");

    let workers = app.start_workers();
    let max_crawling = max_crawling_until_completed(&service, audit.id).await;
    workers.stop().await;

    assert_eq!(app.fetcher.calls(), 5);
    assert_eq!(app.fetcher.max_in_flight(), 1);
    assert!(max_crawling <= 1, "saw {max_crawling} pages crawling at once");
}

#[tokio::test]
async fn test_failed_crawl_awaiting_retry_does_not_hold_crawling() {
    let flaky = "https://example.com/page-1";
    let app = TestApp::new(
        page_urls(5),
        FakeFetcher::new(Duration::from_millis(25)).fail_times(flaky, 2),
    );
    let service = app.app.state().audit_service.clone();
    let audit = service
        .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
        .await
        .expect("start");

    let workers = app.start_workers();
    let max_crawling = max_crawling_until_completed(&service, audit.id).await;
    workers.stop().await;

    assert!(max_crawling <= 1, "saw {max_crawling} pages crawling at once");
    assert_eq!(app.fetcher.calls(), 7);
    assert_eq!(app.fetcher.max_in_flight(), 1);

    let report = service.get_audit_progress(audit.id).await.expect("progress");
    assert_eq!(report.progress.completed, 5);
    assert_eq!(report.progress.failed, 0);

    let pages = service.list_pages(audit.id).await.expect("pages");
    let retried = pages.iter().find(|p| p.url == flaky).expect("page");
    assert_eq!(retried.status, PageStatus::Completed);
    assert!(retried.error_message.is_none());
}

#[tokio::test]
async fn test_transient_fetch_failure_is_retried() {
    let flaky = "https://example.com/page-1";
    let app = TestApp::new(
        page_urls(2),
        FakeFetcher::new(Duration::from_millis(1)).fail_times(flaky, 2),
    );
    let service = app.app.state().audit_service.clone();
    let audit = service
        .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
        .await
        .expect("start");

    let workers = app.start_workers();
    let report = app.wait_for_completion(audit.id, WAIT).await;
    workers.stop().await;

    assert_eq!(report.progress.completed, 2);
    assert_eq!(app.fetcher.calls(), 4);

    let crawl_job = app
        .store
        .jobs()
        .await
        .into_iter()
        .find(|j| j.payload["url"] == flaky && j.job_type == JobType::CrawlPage)
        .expect("crawl job");
    assert_eq!(crawl_job.status, JobStatus::Completed);
    assert_eq!(crawl_job.attempts, 3);
}

#[tokio::test]
async fn test_exhausted_page_fails_and_audit_still_completes() {
    let broken = "https://example.com/page-0";
    let app = TestApp::new(
        page_urls(2),
        FakeFetcher::new(Duration::from_millis(1)).fail_times(broken, usize::MAX),
    );
    let service = app.app.state().audit_service.clone();
    let audit = service
        .start_audit(StartAuditRequest::new("https://example.com/sitemap.xml"))
        .await
        .expect("start");

    let workers = app.start_workers();
    let report = app.wait_for_completion(audit.id, WAIT).await;
    workers.stop().await;

    assert_eq!(report.progress.failed, 1);
    assert_eq!(report.progress.completed, 1);
    assert_eq!(report.audit.processed_urls, 1);
    assert_eq!(app.fetcher.calls(), 3 + 1);

    let pages = service.list_pages(audit.id).await.expect("pages");
    let failed = pages.iter().find(|p| p.url == broken).expect("page");
    assert_eq!(failed.status, PageStatus::Failed);
    assert!(
        failed
            .error_message
            .as_deref()
            .is_some_and(|e| e.contains("HTTP 503"))
    );

    let csv = service.generate_csv_export(audit.id).await.expect("csv");
    assert!(csv.lines().any(|l| l == format!("{broken},,0,,,")));
}

#[tokio::test]
async fn test_url_limit_keeps_first_urls_in_order() {
    let urls = page_urls(100);
    let app = TestApp::new(urls.clone(), FakeFetcher::default());
    let service = app.app.state().audit_service.clone();

    let mut req = StartAuditRequest::new("https://example.com/sitemap.xml");
    req.url_limit = Some(10);
    let audit = service.start_audit(req).await.expect("start");
    assert_eq!(audit.total_urls, 10);

    let pages = service.list_pages(audit.id).await.expect("pages");
    let seeded: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
    let expected: Vec<&str> = urls[..10].iter().map(String::as_str).collect();
    assert_eq!(seeded, expected);

    let stats = app.app.state().queue_service.stats().await.expect("stats");
    assert_eq!(stats.pending, 10);
}
