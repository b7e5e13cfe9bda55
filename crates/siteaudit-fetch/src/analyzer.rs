//! Content quality analysis through an OpenAI-compatible chat completion API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use siteaudit_core::config::AnalyzerConfig;
use siteaudit_core::error::AppError;
use siteaudit_core::result::AppResult;
use siteaudit_core::traits::{ContentAnalysis, ContentAnalyzer, DetectedIssue};
use siteaudit_core::types::issue::{IssueSeverity, IssueType};

use crate::client;

const SYSTEM_PROMPT: &str = "You review website copy for quality problems. \
Reply with a single JSON object and nothing else, shaped as \
{\"quality_score\": <integer 0-100>, \"issues\": [{\"type\": \
\"grammar|redundancy|contradiction|placeholder|empty\", \"severity\": \
\"low|medium|high\", \"description\": <string>, \"snippet\": <exact excerpt>, \
\"suggestion\": <string or null>}]}. Use an empty issues array for clean text.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    quality_score: f64,
    #[serde(default)]
    issues: Vec<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(rename = "type", alias = "issue_type")]
    issue_type: String,
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    suggestion: Option<String>,
}

/// Cut `content` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Locate the JSON object in a model reply.
///
/// Prefers a fenced code block, then falls back to the span from the first
/// `{` to the last `}`.
fn extract_json(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("```") {
        let after = &reply[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let block = body[..end].trim();
            if block.starts_with('{') {
                return Some(block);
            }
        }
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Turn a model reply into a [`ContentAnalysis`].
///
/// The score is rounded and clamped to `0..=100`. Issues with an unknown
/// type or severity, or with no snippet, are dropped.
pub fn parse_reply(reply: &str) -> AppResult<ContentAnalysis> {
    let json = extract_json(reply)
        .ok_or_else(|| AppError::external_service("Analyzer reply contains no JSON object"))?;
    let raw: RawAnalysis = serde_json::from_str(json).map_err(|e| {
        AppError::external_service(format!("Analyzer reply is not a valid analysis: {e}"))
    })?;

    if !raw.quality_score.is_finite() {
        return Err(AppError::external_service("Analyzer returned a non-numeric score"));
    }
    let quality_score = raw.quality_score.round().clamp(0.0, 100.0) as i32;

    let issues = raw
        .issues
        .into_iter()
        .filter_map(|issue| {
            let issue_type = match issue.issue_type.parse::<IssueType>() {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "Dropping analyzer issue");
                    return None;
                }
            };
            let severity = match issue.severity.parse::<IssueSeverity>() {
                Ok(s) => s,
                Err(e) => {
                    warn!(error = %e, "Dropping analyzer issue");
                    return None;
                }
            };
            let snippet = issue.snippet.trim().to_string();
            if snippet.is_empty() && issue_type != IssueType::Empty {
                return None;
            }
            Some(DetectedIssue {
                issue_type,
                severity,
                description: issue.description.trim().to_string(),
                snippet,
                suggestion: issue
                    .suggestion
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            })
        })
        .collect();

    Ok(ContentAnalysis {
        quality_score,
        issues,
    })
}

/// [`ContentAnalyzer`] backed by a chat completion model.
#[derive(Debug, Clone)]
pub struct LlmContentAnalyzer {
    /// HTTP client.
    client: reqwest::Client,
    /// Analyzer settings.
    config: AnalyzerConfig,
}

impl LlmContentAnalyzer {
    /// Creates a new analyzer. Fails when no API key is configured.
    pub fn new(config: AnalyzerConfig) -> AppResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AppError::configuration(
                "analyzer.api_key is required for the content analyzer",
            ));
        }
        let client = client::build_client(
            &format!("siteaudit/{}", env!("CARGO_PKG_VERSION")),
            config.timeout_seconds,
        )?;
        Ok(Self { client, config })
    }

    fn user_prompt(&self, title: Option<&str>, content: &str) -> String {
        let content = truncate_chars(content, self.config.max_content_chars);
        format!(
            "Title: {}\n\nContent:\n{}",
            title.unwrap_or("(none)"),
            content
        )
    }
}

#[async_trait]
impl ContentAnalyzer for LlmContentAnalyzer {
    async fn analyze(&self, title: Option<&str>, content: &str) -> AppResult<ContentAnalysis> {
        let prompt = self.user_prompt(title, content);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: 0.0,
        };

        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::external_service(format!("Analyzer request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Analyzer API error");
            return Err(AppError::external_service(format!(
                "Analyzer API returned HTTP {status}"
            )));
        }

        let chat: ChatResponse = response.json().await.map_err(|e| {
            AppError::external_service(format!("Analyzer response is not valid JSON: {e}"))
        })?;
        let reply = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::external_service("Analyzer returned no choices"))?;

        let analysis = parse_reply(&reply)?;
        debug!(
            model = %self.config.model,
            quality_score = analysis.quality_score,
            issues = analysis.issues.len(),
            "Content analyzed"
        );
        Ok(analysis)
    }
}
