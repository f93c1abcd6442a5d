
use anyhow::{Context, Result, anyhow};
use scraper::Html;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

use crate::config::FetchConfig;

/// Elements whose text never belongs in extracted page content
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "head", "template"];

/// Fetches a job posting page and reduces it to plain text.
///
/// Sends an identifying user agent with every request and truncates the
/// extracted text to a bounded prefix so downstream extraction stays within
/// model context limits.
#[derive(Debug)]
pub struct PageFetcher {
    agent: Agent,
    max_page_chars: usize,
}

impl PageFetcher {
    #[inline]
    pub fn new(config: &FetchConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            max_page_chars: config.max_page_chars,
        }
    }

    /// Fetch `url` and return the page's visible text, truncated to the
    /// configured character limit
    #[inline]
    pub fn fetch(&self, url: &str) -> Result<String> {
        debug!("Fetching job posting from {}", url);

        let html = match self.agent.get(url).call() {
            Ok(mut response) => response
                .body_mut()
                .read_to_string()
                .with_context(|| format!("Failed to read response body from {}", url))?,
            Err(ureq::Error::StatusCode(code)) => {
                debug!("Fetch failed with status {}: {}", code, url);
                return Err(anyhow!("HTTP error {} fetching {}", code, url));
            }
            Err(e) => {
                debug!("Fetch failed with transport error: {}", e);
                return Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to fetch {}", url));
            }
        };

        let text = extract_page_text(&html);
        let truncated = truncate_chars(&text, self.max_page_chars);
        debug!(
            "Extracted {} chars of page text from {}",
            truncated.chars().count(),
            url
        );

        Ok(truncated)
    }
}

/// Reduce an HTML document to its whitespace-collapsed visible text
fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let in_skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        if in_skipped {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }

    parts.join(" ")
}

/// Truncate to at most `max` characters without splitting a char
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((offset, _)) => text[..offset].to_string(),
        None => text.to_string(),
    }
}
