//! Sitemap resolution over HTTP.
//!
//! Accepts XML `<urlset>` documents, `<sitemapindex>` documents whose
//! children are followed up to a configured depth, and plain-text sitemaps
//! with one URL per line.

use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, info, warn};
use url::Url;

use siteaudit_core::config::FetchConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::SitemapResolver;

use crate::client;

/// Shape of a parsed sitemap document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapKind {
    /// `<urlset>`: locations are pages.
    UrlSet,
    /// `<sitemapindex>`: locations are further sitemaps.
    Index,
    /// Whitespace-separated URLs.
    PlainText,
}

/// Locations found in one sitemap document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSitemap {
    /// Document shape.
    pub kind: SitemapKind,
    /// `<loc>` values or plain-text URLs.
    pub locations: Vec<String>,
}

/// Parse a sitemap body, detecting XML versus plain text.
pub fn parse_sitemap(body: &str) -> AppResult<ParsedSitemap> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('<') {
        parse_xml(trimmed)
    } else {
        Ok(ParsedSitemap {
            kind: SitemapKind::PlainText,
            locations: parse_plain_text(trimmed),
        })
    }
}

fn parse_xml(body: &str) -> AppResult<ParsedSitemap> {
    let mut reader = Reader::from_str(body);
    let mut buf = Vec::new();

    let mut kind = None;
    let mut in_loc = false;
    let mut current = String::new();
    let mut locations = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if kind.is_none() {
                    kind = Some(root_kind(e.local_name().as_ref())?);
                } else if e.local_name().as_ref() == b"loc" {
                    in_loc = true;
                    current.clear();
                }
            }
            Ok(Event::Empty(e)) if kind.is_none() => {
                kind = Some(root_kind(e.local_name().as_ref())?);
            }
            Ok(Event::Text(e)) if in_loc => {
                let text = e
                    .decode()
                    .map_err(|err| AppError::validation(format!("Invalid sitemap text: {err}")))?;
                current.push_str(&text);
            }
            Ok(Event::CData(e)) if in_loc => {
                current.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) if in_loc => {
                let name = e
                    .decode()
                    .map_err(|err| AppError::validation(format!("Invalid sitemap entity: {err}")))?;
                push_entity(&mut current, &name);
            }
            Ok(Event::End(e)) if in_loc && e.local_name().as_ref() == b"loc" => {
                in_loc = false;
                let loc = current.trim();
                if !loc.is_empty() {
                    locations.push(loc.to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::validation(format!(
                    "Malformed sitemap XML at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    let kind = kind.ok_or_else(|| AppError::validation("Sitemap XML has no root element"))?;
    Ok(ParsedSitemap { kind, locations })
}

fn root_kind(name: &[u8]) -> AppResult<SitemapKind> {
    match name {
        b"urlset" => Ok(SitemapKind::UrlSet),
        b"sitemapindex" => Ok(SitemapKind::Index),
        other => Err(AppError::validation(format!(
            "Unexpected sitemap root element <{}>",
            String::from_utf8_lossy(other)
        ))),
    }
}

/// Append the expansion of `&name;` to `out`.
fn push_entity(out: &mut String, name: &str) {
    if let Some(code) = name.strip_prefix('#') {
        let parsed = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        if let Some(ch) = parsed.and_then(char::from_u32) {
            out.push(ch);
            return;
        }
    } else if let Some(text) = quick_xml::escape::resolve_predefined_entity(name) {
        out.push_str(text);
        return;
    }
    out.push('&');
    out.push_str(name);
    out.push(';');
}

/// Every whitespace-separated token that is an absolute http(s) URL.
fn parse_plain_text(body: &str) -> Vec<String> {
    body.split_whitespace()
        .filter(|token| {
            Url::parse(token)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false)
        })
        .map(str::to_string)
        .collect()
}

/// Depth-first walk from `root`, following sitemap indexes up to
/// `max_depth` levels below the root.
///
/// Page URLs come back in document order without duplicates. A child
/// sitemap that cannot be fetched or parsed is skipped; the root failing
/// fails the walk.
pub async fn walk_sitemaps<F, Fut>(root: &str, max_depth: usize, mut fetch: F) -> AppResult<Vec<String>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = AppResult<String>>,
{
    let mut pages = Vec::new();
    let mut seen_pages = HashSet::new();
    let mut seen_sitemaps = HashSet::new();
    let mut stack = vec![(root.to_string(), 0usize)];

    while let Some((url, depth)) = stack.pop() {
        if !seen_sitemaps.insert(url.clone()) {
            continue;
        }

        let parsed = match fetch(url.clone()).await.and_then(|body| parse_sitemap(&body)) {
            Ok(parsed) => parsed,
            Err(e) if depth == 0 => return Err(e),
            Err(e) => {
                warn!(sitemap = %url, error = %e, "Skipping unreadable child sitemap");
                continue;
            }
        };
        debug!(sitemap = %url, kind = ?parsed.kind, locations = parsed.locations.len(), "Sitemap parsed");

        match parsed.kind {
            SitemapKind::Index if depth >= max_depth => {
                warn!(sitemap = %url, depth, "Sitemap index nested too deep, skipping");
            }
            SitemapKind::Index => {
                for child in parsed.locations.into_iter().rev() {
                    stack.push((child, depth + 1));
                }
            }
            SitemapKind::UrlSet | SitemapKind::PlainText => {
                for loc in parsed.locations {
                    if seen_pages.insert(loc.clone()) {
                        pages.push(loc);
                    }
                }
            }
        }
    }

    if pages.is_empty() {
        return Err(AppError::validation(format!("Sitemap {root} lists no URLs")));
    }
    Ok(pages)
}

/// [`SitemapResolver`] that downloads sitemaps with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpSitemapResolver {
    /// HTTP client.
    client: reqwest::Client,
    /// Maximum sitemap index nesting.
    max_depth: usize,
}

impl HttpSitemapResolver {
    /// Creates a new resolver from the fetch settings.
    pub fn new(config: &FetchConfig) -> AppResult<Self> {
        Ok(Self {
            client: client::build_client(&config.user_agent, config.timeout_seconds)?,
            max_depth: config.max_sitemap_depth,
        })
    }
}

#[async_trait]
impl SitemapResolver for HttpSitemapResolver {
    async fn resolve(&self, sitemap_url: &str) -> AppResult<Vec<String>> {
        let client = &self.client;
        let pages = walk_sitemaps(sitemap_url, self.max_depth, |url| async move {
            client::get_text(client, &url).await
        })
        .await?;
        info!(sitemap = %sitemap_url, urls = pages.len(), "Sitemap resolved");
        Ok(pages)
    }
}
