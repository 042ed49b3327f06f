use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Node};
use tracing::debug;

use crate::constants::{BROWSER_USER_AGENT, PAGE_TEXT_LIMIT};

/// A page that answered, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    /// URL after following redirects.
    pub final_url: String,
    /// Whitespace-collapsed visible text, capped at [`PAGE_TEXT_LIMIT`] chars.
    pub text: String,
}

impl FetchedPage {
    /// Lowercased text for keyword matching.
    #[must_use]
    pub fn text_lower(&self) -> String {
        self.text.to_lowercase()
    }
}

/// Result of trying to fetch a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Page(FetchedPage),
    TimedOut,
    Failed(String),
}

/// HTTP fetcher for link checks.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    timeout: Duration,
    retries: u32,
}

impl PageFetcher {
    /// Create a fetcher with a per-request timeout and retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration, retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("Failed to build validation HTTP client")?;

        Ok(Self {
            client,
            timeout,
            retries,
        })
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch a URL, retrying transport failures with a short backoff (0.5s, 1s, ...).
    ///
    /// Never returns an error: every failure is folded into the outcome.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempt = 0;
        loop {
            let outcome = self.fetch_once(url).await;
            if matches!(outcome, FetchOutcome::Page(_)) || attempt >= self.retries {
                return outcome;
            }
            attempt += 1;
            debug!(url = %url, attempt, ?outcome, "Link fetch failed, retrying");
            tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
        }
    }

    async fn fetch_once(&self, url: &str) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return transport_failure(&e),
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        match response.text().await {
            Ok(body) => FetchOutcome::Page(FetchedPage {
                status,
                final_url,
                text: extract_plain_text(&body, PAGE_TEXT_LIMIT),
            }),
            Err(e) => transport_failure(&e),
        }
    }
}

fn transport_failure(e: &reqwest::Error) -> FetchOutcome {
    if e.is_timeout() {
        FetchOutcome::TimedOut
    } else {
        FetchOutcome::Failed(e.to_string())
    }
}

/// Visible text of an HTML document, whitespace-collapsed and truncated to `max_chars`.
#[must_use]
pub fn extract_plain_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            parts.push(&**text);
        }
    }

    let cleaned = parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");

    cleaned.chars().take(max_chars).collect()
}
