//! PostgreSQL store tests.
//!
//! Run with a scratch database:
//! `DATABASE_URL=postgres://... cargo test --test postgres_test -- --ignored`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use siteaudit_core::config::DatabaseConfig;
use siteaudit_core::traits::{ContentAnalysis, DetectedIssue, FetchedContent};
use siteaudit_core::types::PageId;
use siteaudit_core::types::issue::{IssueSeverity, IssueType};
use siteaudit_database::repositories::{AuditRepository, JobRepository};
use siteaudit_database::{AuditStore, DatabasePool, JobStore};
use siteaudit_entity::audit::{Audit, AuditStatus, CreateAudit};
use siteaudit_entity::job::{AnalyzePagePayload, CreateJob, JobPayload, JobStatus};
use siteaudit_entity::page::PageStatus;

async fn connect() -> DatabasePool {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        ..DatabaseConfig::default()
    };
    DatabasePool::connect(&config).await.expect("connect")
}

async fn seeded_audit(audits: &AuditRepository, urls: &[String]) -> Audit {
    let audit = audits
        .create_audit(&CreateAudit {
            user_id: None,
            sitemap_url: "https://example.com/sitemap.xml".to_string(),
            total_urls: urls.len() as i32,
            rate_limit_ms: 0,
            url_limit: None,
        })
        .await
        .expect("create audit");
    audits.seed_pages(&audit, urls, 3).await.expect("seed");
    audit
}

fn urls(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("https://example.com/pg-{i}"))
        .collect()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_seed_crawl_and_analyze_on_postgres() {
    let pool = connect().await;
    let audits = AuditRepository::new(pool.pool().clone());

    let audit = seeded_audit(&audits, &urls(2)).await;
    let stored = audits
        .find_audit(audit.id)
        .await
        .expect("find")
        .expect("audit exists");
    assert_eq!(stored.status, AuditStatus::Crawling);

    let pages = audits.list_pages(audit.id).await.expect("pages");
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].url, "https://example.com/pg-0");
    assert_eq!(pages[1].position, 1);

    let page = &pages[0];
    assert!(
        audits
            .transition_page(page.id, PageStatus::Crawling)
            .await
            .expect("crawl")
    );
    assert!(
        !audits
            .transition_page(page.id, PageStatus::Completed)
            .await
            .expect("illegal move"),
        "crawling pages cannot skip analysis"
    );

    let analyze = CreateJob::from_payload(
        &JobPayload::AnalyzePage(AnalyzePagePayload {
            audit_id: audit.id,
            page_id: page.id,
            url: page.url.clone(),
        }),
        3,
    )
    .expect("job");
    let content = FetchedContent {
        title: Some("Home".to_string()),
        content: "Lorem ipsum dolor".to_string(),
    };
    assert!(
        audits
            .complete_crawl(page.id, &content, &analyze)
            .await
            .expect("complete crawl")
    );

    let analysis = ContentAnalysis {
        quality_score: 35,
        issues: vec![DetectedIssue {
            issue_type: IssueType::Placeholder,
            severity: IssueSeverity::High,
            description: "Filler text".to_string(),
            snippet: "Lorem ipsum".to_string(),
            suggestion: None,
        }],
    };
    assert!(
        audits
            .complete_analysis(page.id, &analysis)
            .await
            .expect("complete analysis")
    );
    assert!(
        !audits
            .complete_analysis(page.id, &analysis)
            .await
            .expect("second analysis"),
        "a completed page is not analyzed twice"
    );

    let issues = audits
        .list_issues_for_audit(audit.id)
        .await
        .expect("issues");
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].page_id, page.id);

    let stored = audits
        .find_audit(audit.id)
        .await
        .expect("find")
        .expect("audit exists");
    assert_eq!(stored.processed_urls, 1);

    let counts = audits
        .count_pages_by_status(audit.id)
        .await
        .expect("counts");
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending, 1);

    let jobs = JobRepository::new(pool.pool().clone());
    let live = jobs.enqueue(&analyze).await.expect("enqueue");

    assert!(audits.delete_audit(audit.id).await.expect("delete"));
    assert!(audits.find_audit(audit.id).await.expect("find").is_none());
    assert!(audits.list_pages(audit.id).await.expect("pages").is_empty());

    let kept = jobs
        .find_job(live.id)
        .await
        .expect("find job")
        .expect("job row kept");
    assert_eq!(kept.status, JobStatus::Failed);
    assert!(kept.processed_at.is_some());
    assert_eq!(kept.payload["last_error"], "Audit deleted");

    jobs.complete(live.id).await.expect("late complete");
    let kept = jobs.find_job(live.id).await.expect("find").expect("job");
    assert_eq!(kept.status, JobStatus::Failed);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_claims_never_share_a_job() {
    let pool = connect().await;
    let audits = AuditRepository::new(pool.pool().clone());
    let jobs: Arc<dyn JobStore> = Arc::new(JobRepository::new(pool.pool().clone()));

    let audit = seeded_audit(&audits, &urls(20)).await;
    let pages: Vec<PageId> = audits
        .list_pages(audit.id)
        .await
        .expect("pages")
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let jobs = Arc::clone(&jobs);
        tasks.push(tokio::spawn(async move {
            let mut claimed = Vec::new();
            while let Some(job) = jobs
                .claim_next(Duration::from_secs(60))
                .await
                .expect("claim")
            {
                assert_eq!(job.status, JobStatus::Processing);
                claimed.push(job);
            }
            claimed
        }));
    }

    let mut claims_per_page: HashMap<String, usize> = HashMap::new();
    for task in tasks {
        for job in task.await.expect("claimer panicked") {
            if let Some(page_id) = job.payload.get("page_id").and_then(|v| v.as_str()) {
                *claims_per_page.entry(page_id.to_string()).or_default() += 1;
            }
            jobs.complete(job.id).await.expect("complete");
        }
    }

    for page_id in &pages {
        assert_eq!(
            claims_per_page.get(&page_id.to_string()),
            Some(&1),
            "page {page_id} claimed once"
        );
    }

    audits.delete_audit(audit.id).await.expect("cleanup");
}
