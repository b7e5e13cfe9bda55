//! Audit management commands.

use std::sync::Arc;

use clap::{Args, Subcommand};

use siteaudit_core::config::AppConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::types::{AuditId, UserId};
use siteaudit_fetch::HttpSitemapResolver;
use siteaudit_service::{AuditService, StartAuditRequest};

use crate::output::{self, AuditRow, OutputFormat, PageRow};

/// Arguments for audit commands
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Audit subcommand
    #[command(subcommand)]
    pub command: AuditCommand,
}

/// Audit subcommands
#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Resolve a sitemap and queue every page for crawling
    Start {
        /// Sitemap URL
        sitemap_url: String,
        /// Delay between crawl requests in milliseconds
        #[arg(long)]
        rate_limit_ms: Option<i64>,
        /// Keep only the first N URLs
        #[arg(long)]
        url_limit: Option<i32>,
        /// Submitting user id
        #[arg(long)]
        user_id: Option<UserId>,
    },
    /// Show progress of an audit
    Progress {
        /// Audit id
        id: AuditId,
    },
    /// List the pages of an audit
    Pages {
        /// Audit id
        id: AuditId,
    },
    /// Export an audit as CSV
    Export {
        /// Audit id
        id: AuditId,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Delete an audit with its pages, issues and jobs
    Delete {
        /// Audit id
        id: AuditId,
    },
    /// List recent audits
    List {
        /// Maximum number of audits
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

/// Execute audit commands
pub async fn execute(
    args: &AuditArgs,
    config: AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let stores = super::open_stores(&config).await?;
    let resolver = Arc::new(HttpSitemapResolver::new(&config.fetch)?);
    let service = AuditService::new(
        stores.audits.clone(),
        resolver,
        config.pipeline.clone(),
        config.worker.max_attempts,
    );

    match &args.command {
        AuditCommand::Start {
            sitemap_url,
            rate_limit_ms,
            url_limit,
            user_id,
        } => {
            let audit = service
                .start_audit(StartAuditRequest {
                    sitemap_url: sitemap_url.clone(),
                    user_id: *user_id,
                    rate_limit_ms: *rate_limit_ms,
                    url_limit: *url_limit,
                })
                .await?;
            match format {
                OutputFormat::Json => output::print_json(&audit),
                OutputFormat::Table => {
                    output::print_success(&format!(
                        "Audit {} started with {} URLs",
                        audit.id, audit.total_urls
                    ));
                }
            }
        }
        AuditCommand::Progress { id } => {
            let report = service.get_audit_progress(*id).await?;
            match format {
                OutputFormat::Json => output::print_json(&report),
                OutputFormat::Table => {
                    let p = &report.progress;
                    println!("Audit {}:", report.audit.id);
                    output::print_kv("Sitemap", &report.audit.sitemap_url);
                    output::print_kv("Status", report.audit.status.as_str());
                    output::print_kv("Progress", &format!("{}%", p.percentage));
                    output::print_kv("Total", &p.total.to_string());
                    output::print_kv("Pending", &p.pending.to_string());
                    output::print_kv("Crawling", &p.crawling.to_string());
                    output::print_kv("Analyzing", &p.analyzing.to_string());
                    output::print_kv("Completed", &p.completed.to_string());
                    output::print_kv("Failed", &p.failed.to_string());
                }
            }
        }
        AuditCommand::Pages { id } => {
            let pages = service.list_pages(*id).await?;
            output::print_list(&pages, format, |p| PageRow::from(p));
        }
        AuditCommand::Export { id, output: path } => {
            let csv = service.generate_csv_export(*id).await?;
            match path {
                Some(path) => {
                    tokio::fs::write(path, csv).await?;
                    output::print_success(&format!("Exported audit {id} to {path}"));
                }
                None => print!("{csv}"),
            }
        }
        AuditCommand::Delete { id } => {
            service.delete_audit(*id).await?;
            output::print_success(&format!("Audit {id} deleted"));
        }
        AuditCommand::List { limit } => {
            let audits = service.list_audits(*limit).await?;
            output::print_list(&audits, format, |a| AuditRow::from(a));
        }
    }

    Ok(())
}
