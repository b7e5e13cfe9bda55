//! CSV rendering of audit results.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use siteaudit_core::types::PageId;
use siteaudit_entity::issue::Issue;
use siteaudit_entity::page::Page;

/// Column header of the export.
pub const CSV_HEADER: &str = "url,quality_score,issue_count,issues_summary,flagged_snippets,suggestions";

const LIST_SEPARATOR: &str = " | ";

/// Quote a field when it contains a delimiter, a quote or a line break;
/// embedded quotes are doubled.
fn escape_csv(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

/// Render one row per page, in the order given.
///
/// Failed and unanalyzed pages appear with an empty score. Issues are
/// matched to their page by id; the summary lists `type/severity: description`
/// entries, the snippet and suggestion columns list the raw values.
pub fn render_csv(pages: &[Page], issues: &[Issue]) -> String {
    let mut by_page: HashMap<PageId, Vec<&Issue>> = HashMap::new();
    for issue in issues {
        by_page.entry(issue.page_id).or_default().push(issue);
    }

    let mut out = String::with_capacity(CSV_HEADER.len() + pages.len() * 128);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for page in pages {
        let page_issues = by_page.get(&page.id).map(Vec::as_slice).unwrap_or_default();

        let score = page
            .quality_score
            .map(|s| s.to_string())
            .unwrap_or_default();
        let summary = page_issues
            .iter()
            .map(|i| format!("{}/{}: {}", i.issue_type, i.severity, i.description))
            .collect::<Vec<_>>()
            .join("; ");
        let snippets = page_issues
            .iter()
            .map(|i| i.snippet.as_str())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR);
        let suggestions = page_issues
            .iter()
            .filter_map(|i| i.suggestion.as_deref())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR);

        let _ = writeln!(
            out,
            "{},{},{},{},{},{}",
            escape_csv(&page.url),
            score,
            page_issues.len(),
            escape_csv(&summary),
            escape_csv(&snippets),
            escape_csv(&suggestions),
        );
    }

    out
}
