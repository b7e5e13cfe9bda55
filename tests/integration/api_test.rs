//! HTTP API tests against the in-memory store.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;

use siteaudit_core::types::AuditId;

use helpers::{FakeFetcher, TestApp, page_urls};

const SITEMAP: &str = "https://example.com/sitemap.xml";

fn audit_id(body: &serde_json::Value) -> AuditId {
    serde_json::from_value(body["data"]["id"].clone()).expect("audit id")
}

#[tokio::test]
async fn test_create_audit_returns_created_audit() {
    let app = TestApp::new(page_urls(3), FakeFetcher::default());

    let resp = app
        .request(
            "POST",
            "/api/audits",
            Some(json!({ "sitemap_url": SITEMAP, "rate_limit_ms": 0 })),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.body["success"], true);
    assert_eq!(resp.body["data"]["sitemap_url"], SITEMAP);
    assert_eq!(resp.body["data"]["status"], "pending");
    assert_eq!(resp.body["data"]["total_urls"], 3);
    assert_eq!(resp.body["data"]["processed_urls"], 0);
}

#[tokio::test]
async fn test_create_audit_rejects_bad_input() {
    let app = TestApp::new(page_urls(3), FakeFetcher::default());

    for body in [
        json!({ "sitemap_url": "not a url" }),
        json!({ "sitemap_url": "ftp://example.com/sitemap.xml" }),
        json!({ "sitemap_url": SITEMAP, "url_limit": 0 }),
        json!({ "sitemap_url": SITEMAP, "rate_limit_ms": -5 }),
    ] {
        let resp = app.request("POST", "/api/audits", Some(body.clone())).await;
        assert_eq!(resp.status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(resp.body["success"], false);
        assert_eq!(resp.body["error"], "VALIDATION_ERROR");
    }

    let stats = app.request("GET", "/api/queue/stats", None).await;
    assert_eq!(stats.body["data"]["pending"], 0, "rejected audits seed nothing");
}

#[tokio::test]
async fn test_empty_sitemap_is_a_validation_error() {
    let app = TestApp::new(Vec::new(), FakeFetcher::default());

    let resp = app
        .request("POST", "/api/audits", Some(json!({ "sitemap_url": SITEMAP })))
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_audit_is_not_found() {
    let app = TestApp::new(page_urls(1), FakeFetcher::default());
    let missing = AuditId::new();

    for path in [
        format!("/api/audits/{missing}"),
        format!("/api/audits/{missing}/pages"),
        format!("/api/audits/{missing}/export.csv"),
    ] {
        let resp = app.request("GET", &path, None).await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND, "path: {path}");
        assert_eq!(resp.body["error"], "NOT_FOUND");
    }

    let resp = app
        .request("DELETE", &format!("/api/audits/{missing}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_progress_pages_and_export_after_run() {
    let mut urls = page_urls(2);
    urls.push("https://example.com/draft".to_string());
    let app = TestApp::new(urls, FakeFetcher::default());

    let created = app
        .request(
            "POST",
            "/api/audits",
            Some(json!({ "sitemap_url": SITEMAP, "rate_limit_ms": 0 })),
        )
        .await;
    let id = audit_id(&created.body);

    let before = app.request("GET", &format!("/api/audits/{id}"), None).await;
    assert_eq!(before.status, StatusCode::OK);
    assert_eq!(before.body["data"]["progress"]["pending"], 3);
    assert_eq!(before.body["data"]["progress"]["percentage"], 0);

    let workers = app.start_workers();
    app.wait_for_completion(id, Duration::from_secs(10)).await;
    workers.stop().await;

    let after = app.request("GET", &format!("/api/audits/{id}"), None).await;
    assert_eq!(after.body["data"]["audit"]["status"], "completed");
    assert_eq!(after.body["data"]["audit"]["processed_urls"], 3);
    assert_eq!(after.body["data"]["progress"]["percentage"], 100);

    let pages = app
        .request("GET", &format!("/api/audits/{id}/pages"), None)
        .await;
    let pages = pages.body["data"].as_array().expect("pages array").clone();
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[0]["url"], "https://example.com/page-0");
    assert_eq!(pages[2]["quality_score"], 20);
    assert!(pages.iter().all(|p| p["status"] == "completed"));

    let csv = app
        .request("GET", &format!("/api/audits/{id}/export.csv"), None)
        .await;
    assert_eq!(csv.status, StatusCode::OK);
    assert_eq!(csv.content_type.as_deref(), Some("text/csv; charset=utf-8"));
    assert!(csv.text.starts_with("url,quality_score,issue_count,"));
    assert_eq!(csv.text.lines().count(), 4);
    assert!(csv.text.contains("https://example.com/draft,20,1,"));
}

#[tokio::test]
async fn test_delete_removes_audit_and_fails_its_jobs() {
    let app = TestApp::new(page_urls(4), FakeFetcher::default());

    let created = app
        .request("POST", "/api/audits", Some(json!({ "sitemap_url": SITEMAP })))
        .await;
    let id = audit_id(&created.body);

    let stats = app.request("GET", "/api/queue/stats", None).await;
    assert_eq!(stats.body["data"]["pending"], 4);

    let resp = app
        .request("DELETE", &format!("/api/audits/{id}"), None)
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.request("GET", &format!("/api/audits/{id}"), None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let stats = app.request("GET", "/api/queue/stats", None).await;
    assert_eq!(stats.body["data"]["pending"], 0);
    assert_eq!(stats.body["data"]["failed"], 4, "job rows are kept as failed");

    let jobs = app.store.jobs().await;
    assert!(jobs.iter().all(|j| j.payload["last_error"] == "Audit deleted"));
}

#[tokio::test]
async fn test_list_audits_newest_first_with_limit() {
    let app = TestApp::new(page_urls(1), FakeFetcher::default());

    let mut ids = Vec::new();
    for _ in 0..3 {
        let created = app
            .request("POST", "/api/audits", Some(json!({ "sitemap_url": SITEMAP })))
            .await;
        ids.push(created.body["data"]["id"].clone());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let resp = app.request("GET", "/api/audits?limit=2", None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let listed = resp.body["data"].as_array().expect("audits array");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], ids[2]);
    assert_eq!(listed[1]["id"], ids[1]);
}

#[tokio::test]
async fn test_health_and_queue_stats() {
    let app = TestApp::new(page_urls(2), FakeFetcher::default());

    let health = app.request("GET", "/api/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["data"]["status"], "ok");
    assert_eq!(health.body["data"]["database"], "memory");

    app.request("POST", "/api/audits", Some(json!({ "sitemap_url": SITEMAP })))
        .await;

    let stats = app.request("GET", "/api/queue/stats", None).await;
    assert_eq!(stats.status, StatusCode::OK);
    assert_eq!(stats.body["data"]["pending"], 2);
    assert_eq!(stats.body["data"]["processing"], 0);
    assert_eq!(stats.body["data"]["completed"], 0);
    assert_eq!(stats.body["data"]["failed"], 0);
}
