//! Page download and readable-text extraction.

use std::sync::OnceLock;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use siteaudit_core::config::FetchConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentFetcher, FetchedContent};

use crate::client;

/// Elements whose text is never part of the page content.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "header", "footer", "aside", "form",
];

/// Extract the title and visible body text of an HTML document.
///
/// Text inside navigation, chrome and scripting elements is dropped and
/// whitespace is collapsed to single spaces.
pub fn extract_page(html: &str) -> FetchedContent {
    let document = Html::parse_document(html);
    FetchedContent {
        title: extract_title(&document),
        content: extract_text(&document),
    }
}

fn extract_title(document: &Html) -> Option<String> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    let selector = SELECTOR.get_or_init(|| Selector::parse("title").ok()).as_ref()?;
    document
        .select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
}

fn extract_text(document: &Html) -> String {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    let root = SELECTOR
        .get_or_init(|| Selector::parse("body").ok())
        .as_ref()
        .and_then(|selector| document.select(selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut parts = Vec::new();
    collect_text(root, &mut parts);
    collapse_whitespace(&parts.join(" "))
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push(text),
            Node::Element(el) if SKIPPED_ELEMENTS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// [`ContentFetcher`] that downloads pages with `reqwest` and reads them
/// with `scraper`.
#[derive(Debug, Clone)]
pub struct HtmlContentFetcher {
    /// HTTP client.
    client: reqwest::Client,
}

impl HtmlContentFetcher {
    /// Creates a new fetcher from the fetch settings.
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        Ok(Self {
            client: client::build_client(&config.user_agent, config.timeout_seconds)?,
        })
    }
}

#[async_trait]
impl ContentFetcher for HtmlContentFetcher {
    async fn fetch(&self, url: &str) -> AppResult<FetchedContent> {
        let body = client::get_text(&self.client, url).await?;
        let page = extract_page(&body);
        if page.content.is_empty() {
            return Err(AppError::external_service(format!(
                "No readable text on {url}"
            )));
        }
        debug!(url, chars = page.content.len(), "Page fetched");
        Ok(page)
    }
}
