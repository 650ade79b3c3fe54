//! HTTP content extractor
//!
//! Fetches a URL with reqwest and renders HTML to plain text with `html2text`.
//! Non-HTML bodies are returned as they are.

use std::time::Duration;

use application::{
    error::ApplicationError,
    ports::{ContentExtractorPort, ExtractedContent},
};
use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::{debug, instrument, warn};

use crate::config::ExtractConfig;

/// Default extractor for URLs without page text
#[derive(Debug, Clone)]
pub struct HttpContentExtractor {
    client: Client,
    text_width: usize,
}

impl HttpContentExtractor {
    pub fn new(config: &ExtractConfig) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApplicationError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            text_width: config.text_width.max(20),
        })
    }

    fn map_error(e: &reqwest::Error) -> ApplicationError {
        if e.is_timeout() {
            ApplicationError::Timeout(format!("fetching page: {e}"))
        } else {
            ApplicationError::ExternalService(format!("fetching page: {e}"))
        }
    }
}

/// Contents of the first `<title>` element
fn html_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title")?;
    let title = html[start..end].split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

#[async_trait]
impl ContentExtractorPort for HttpContentExtractor {
    #[instrument(skip(self))]
    async fn extract(&self, url: &str) -> Result<ExtractedContent, ApplicationError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ApplicationError::Validation(format!(
                "Only http(s) URLs can be fetched: {url}"
            )));
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "Page fetch failed");
            return Err(ApplicationError::ExternalService(format!(
                "fetching {url}: HTTP {status}"
            )));
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("html"));
        let body = response.bytes().await.map_err(|e| Self::map_error(&e))?;

        let (title, text) = if is_html {
            let raw = String::from_utf8_lossy(&body);
            let text = html2text::from_read(body.as_ref(), self.text_width)
                .map_err(|e| ApplicationError::ExternalService(format!("rendering HTML: {e}")))?;
            (html_title(&raw), text)
        } else {
            (None, String::from_utf8_lossy(&body).into_owned())
        };

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ApplicationError::ExternalService(format!(
                "no readable text at {url}"
            )));
        }
        debug!(chars = text.chars().count(), is_html, "Extracted page text");

        Ok(ExtractedContent {
            url: url.to_string(),
            title,
            text,
        })
    }
}
