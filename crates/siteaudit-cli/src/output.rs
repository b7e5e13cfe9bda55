//! Table and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use siteaudit_entity::audit::Audit;
use siteaudit_entity::page::Page;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// One audit as a table row.
#[derive(Debug, Tabled)]
pub struct AuditRow {
    /// Audit id.
    pub id: String,
    /// Audit status.
    pub status: String,
    /// Pages analyzed out of total.
    pub processed: String,
    /// Sitemap URL.
    pub sitemap: String,
    /// Creation time.
    pub created: String,
}

impl From<&Audit> for AuditRow {
    fn from(audit: &Audit) -> Self {
        Self {
            id: audit.id.to_string(),
            status: audit.status.to_string(),
            processed: format!("{}/{}", audit.processed_urls, audit.total_urls),
            sitemap: audit.sitemap_url.clone(),
            created: audit.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// One page as a table row.
#[derive(Debug, Tabled)]
pub struct PageRow {
    /// Position in the sitemap.
    pub position: i32,
    /// Page status.
    pub status: String,
    /// Quality score, blank until analyzed.
    pub score: String,
    /// Page URL.
    pub url: String,
    /// Last error, if any.
    pub error: String,
}

impl From<&Page> for PageRow {
    fn from(page: &Page) -> Self {
        Self {
            position: page.position,
            status: page.status.as_str().to_string(),
            score: page.quality_score.map(|s| s.to_string()).unwrap_or_default(),
            url: page.url.clone(),
            error: page.error_message.clone().unwrap_or_default(),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize, R: Tabled>(items: &[T], format: OutputFormat, row: impl Fn(&T) -> R) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                let rows: Vec<R> = items.iter().map(row).collect();
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => print_json(items),
    }
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => print_error(&format!("Failed to render JSON: {e}")),
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}
