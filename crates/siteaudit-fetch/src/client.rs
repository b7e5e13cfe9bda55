//! Shared HTTP client construction and error mapping.

use std::time::Duration;

use siteaudit_core::error::{AppError, ErrorKind};
use siteaudit_core::result::AppResult;

/// Build a client with the configured User-Agent and request timeout.
pub fn build_client(user_agent: &str, timeout_seconds: u64) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_seconds.max(1)))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e))
}

/// GET `url` and return the body, failing on transport errors and non-2xx
/// responses.
pub async fn get_text(client: &reqwest::Client, url: &str) -> AppResult<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::external_service(format!("Request to {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::external_service(format!("HTTP {status} for {url}")));
    }

    response
        .text()
        .await
        .map_err(|e| AppError::external_service(format!("Failed to read body of {url}: {e}")))
}
