use anyhow::{Context, Result, anyhow};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::model::{AnalyzeResult, parse_analyze_result};
use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use super::{AnalysisKind, AnalyzeFuture, DocumentAnalyzer, DocumentInput};

pub const DEFAULT_API_VERSION: &str = "2024-11-30";
pub const DEFAULT_LAYOUT_MODEL: &str = "prebuilt-layout";
pub const DEFAULT_READ_MODEL: &str = "prebuilt-read";
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Submits documents to the analysis service and polls the returned
/// operation until it settles.
#[derive(Debug, Clone)]
pub struct HttpAnalyzer {
    endpoint: String,
    key: String,
    layout_model: String,
    read_model: String,
    api_version: String,
    poll_interval: Duration,
    client: reqwest::Client,
}

impl HttpAnalyzer {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            layout_model: DEFAULT_LAYOUT_MODEL.to_string(),
            read_model: DEFAULT_READ_MODEL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_models(mut self, layout: impl Into<String>, read: impl Into<String>) -> Self {
        let layout = layout.into();
        let read = read.into();
        if !layout.trim().is_empty() {
            self.layout_model = layout;
        }
        if !read.trim().is_empty() {
            self.read_model = read;
        }
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        let api_version = api_version.into();
        if !api_version.trim().is_empty() {
            self.api_version = api_version;
        }
        self
    }

    /// A zero interval keeps the current one.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        if !interval.is_zero() {
            self.poll_interval = interval;
        }
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn analyze_url(&self, kind: AnalysisKind) -> String {
        let model = match kind {
            AnalysisKind::Layout => &self.layout_model,
            AnalysisKind::Read => &self.read_model,
        };
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint.trim_end_matches('/'),
            model,
            self.api_version
        )
    }
}

impl DocumentAnalyzer for HttpAnalyzer {
    fn analyze(&self, kind: AnalysisKind, document: DocumentInput) -> AnalyzeFuture {
        let analyzer = self.clone();
        Box::pin(async move {
            let url = analyzer.analyze_url(kind);
            let operation = submit(&analyzer, &url, kind, &document).await?;
            debug!("{} analysis accepted: {}", kind.as_str(), operation);
            poll(&analyzer, &operation, kind).await
        })
    }
}

async fn submit(
    analyzer: &HttpAnalyzer,
    url: &str,
    kind: AnalysisKind,
    document: &DocumentInput,
) -> Result<String> {
    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        attempt += 1;
        let response = analyzer
            .client
            .post(url)
            .header(KEY_HEADER, &analyzer.key)
            .header(CONTENT_TYPE, &document.mime)
            .body(document.bytes.as_ref().clone())
            .send()
            .await
            .with_context(|| format!("failed to submit {} analysis", kind.as_str()))?;

        let status = response.status();
        let retry_after = retry_after(response.headers());
        let operation = response
            .headers()
            .get("operation-location")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.unwrap_or_default();
        if status.is_success() {
            return operation
                .ok_or_else(|| anyhow!("{} analysis response has no operation location", kind.as_str()));
        }
        if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
            delay = wait_with_backoff(kind.as_str(), attempt, delay, retry_after).await;
            continue;
        }
        return Err(anyhow!(
            "{} analysis request failed ({}): {}",
            kind.as_str(),
            status,
            extract_service_error(&text).unwrap_or(text)
        ));
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
}

async fn poll(analyzer: &HttpAnalyzer, operation: &str, kind: AnalysisKind) -> Result<AnalyzeResult> {
    let mut attempt = 0usize;
    let mut delay = RATE_LIMIT_BASE_DELAY;
    loop {
        sleep(analyzer.poll_interval).await;
        let response = analyzer
            .client
            .get(operation)
            .header(KEY_HEADER, &analyzer.key)
            .send()
            .await
            .with_context(|| format!("failed to poll {} analysis", kind.as_str()))?;
        let status = response.status();
        let retry_after = retry_after(response.headers());
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                attempt += 1;
                delay = wait_with_backoff(kind.as_str(), attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "{} analysis poll failed ({}): {}",
                kind.as_str(),
                status,
                extract_service_error(&text).unwrap_or(text)
            ));
        }
        if let Some(result) = settle_operation(&text, kind)? {
            return Ok(result);
        }
    }
}

/// `None` while the operation is still running.
fn settle_operation(text: &str, kind: AnalysisKind) -> Result<Option<AnalyzeResult>> {
    let value: serde_json::Value = serde_json::from_str(text)
        .with_context(|| format!("invalid {} operation response", kind.as_str()))?;
    let OperationStatus { status } = serde_json::from_value(value.clone())
        .with_context(|| format!("{} operation response has no status", kind.as_str()))?;
    match status.as_str() {
        "succeeded" => parse_analyze_result(value).map(Some),
        "failed" | "canceled" => Err(anyhow!(
            "{} analysis {}: {}",
            kind.as_str(),
            status,
            extract_service_error(text).unwrap_or_else(|| "no details".to_string())
        )),
        _ => Ok(None),
    }
}

fn extract_service_error(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let error = value.get("error")?;
    let message = error.get("message").and_then(|m| m.as_str())?;
    match error.get("code").and_then(|c| c.as_str()) {
        Some(code) => Some(format!("{}: {}", code, message)),
        None => Some(message.to_string()),
    }
}
