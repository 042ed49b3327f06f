//! Reddit public JSON listing collector.
//!
//! Reads `/r/<subreddit>/new.json` without OAuth. Each post's links come from
//! the markdown self text, the rendered `selftext_html`, and the post's own
//! URL when it points off-site.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::link_extractor::{extract_html_links, extract_urls};
use super::normalize::{bare_host, normalize_url};
use super::Collector;
use crate::config::Config;
use crate::db::NewPost;

const SOURCE: &str = "reddit";
const PERMALINK_BASE: &str = "https://www.reddit.com";

/// Top-level listing response.
#[derive(Debug, Deserialize)]
pub struct Listing {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
pub struct ListingChild {
    pub data: RedditPost,
}

/// The subset of a Reddit `t3` (link post) we use.
#[derive(Debug, Deserialize)]
pub struct RedditPost {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub selftext_html: Option<String>,
    pub author: Option<String>,
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub permalink: String,
    pub url: Option<String>,
}

/// Collector for one or more subreddits.
pub struct RedditCollector {
    client: reqwest::Client,
    base_url: String,
    subreddits: Vec<String>,
    limit: u32,
    retries: u32,
}

impl RedditCollector {
    /// Build a collector from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.collect_timeout)
            .user_agent(config.reddit_user_agent.clone())
            .build()
            .context("Failed to build Reddit HTTP client")?;

        Ok(Self {
            client,
            base_url: config.reddit_base_url.trim_end_matches('/').to_string(),
            subreddits: config.subreddits.clone(),
            limit: config.reddit_post_limit,
            retries: config.fetch_retries,
        })
    }

    fn listing_url(&self, subreddit: &str) -> String {
        format!(
            "{}/r/{subreddit}/new.json?limit={}",
            self.base_url, self.limit
        )
    }

    /// Fetch a listing, retrying with exponential backoff (1s, 2s, ...).
    async fn fetch_listing(&self, url: &str) -> Result<Listing> {
        let mut attempt = 0;
        loop {
            match self.fetch_listing_once(url).await {
                Ok(listing) => return Ok(listing),
                Err(e) if attempt < self.retries => {
                    let wait = Duration::from_secs(1 << attempt.min(5));
                    debug!(url = %url, attempt, "Listing fetch failed, retrying: {e:#}");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to fetch {url} after {} attempts", attempt + 1)
                    })
                }
            }
        }
    }

    async fn fetch_listing_once(&self, url: &str) -> Result<Listing> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send listing request")?;

        if !response.status().is_success() {
            anyhow::bail!("Listing fetch failed with status {}", response.status());
        }

        response
            .json::<Listing>()
            .await
            .context("Failed to parse listing JSON")
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn source(&self) -> &'static str {
        SOURCE
    }

    async fn collect(&self) -> Result<Vec<NewPost>> {
        let mut posts = Vec::new();
        let mut failures = 0;

        for subreddit in &self.subreddits {
            let url = self.listing_url(subreddit);
            match self.fetch_listing(&url).await {
                Ok(listing) => {
                    let before = posts.len();
                    posts.extend(
                        listing
                            .data
                            .children
                            .into_iter()
                            .filter_map(|child| parse_post(child.data, subreddit)),
                    );
                    info!(subreddit = %subreddit, count = posts.len() - before, "Fetched listing");
                }
                Err(e) => {
                    warn!(subreddit = %subreddit, "Skipping subreddit: {e:#}");
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.subreddits.len() {
            anyhow::bail!("All {failures} subreddit listings failed");
        }

        Ok(posts)
    }
}

/// Convert a listing entry into a post. Entries without an ID are dropped.
#[must_use]
pub fn parse_post(post: RedditPost, subreddit: &str) -> Option<NewPost> {
    if post.id.is_empty() {
        return None;
    }

    let permalink = if post.permalink.is_empty() {
        None
    } else if post.permalink.starts_with("http") {
        Some(post.permalink.clone())
    } else {
        Some(format!("{PERMALINK_BASE}{}", post.permalink))
    };

    let mut candidates = extract_urls(&post.selftext);
    if let Some(html) = post.selftext_html.as_deref() {
        candidates.extend(extract_html_links(html));
    }
    if let Some(url) = post.url.as_deref() {
        candidates.push(url.to_string());
    }

    let author = post
        .author
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| "[deleted]".to_string());

    #[allow(clippy::cast_possible_truncation)]
    let published_at = post
        .created_utc
        .and_then(|ts| DateTime::from_timestamp(ts as i64, 0))
        .map(|dt| dt.to_rfc3339());

    Some(NewPost {
        source: SOURCE.to_string(),
        source_id: post.id,
        community: Some(subreddit.to_string()),
        title: Some(post.title).filter(|t| !t.is_empty()),
        body: Some(post.selftext).filter(|t| !t.is_empty()),
        author: Some(author),
        permalink,
        links: outbound_links(candidates),
        published_at,
    })
}

/// Normalize, drop Reddit-internal and non-web links, and dedupe in order.
fn outbound_links(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|url| normalize_url(&url))
        .filter(|url| url.starts_with("https://") || url.starts_with("http://"))
        .filter(|url| !bare_host(url).is_some_and(|host| is_reddit_host(&host)))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

fn is_reddit_host(host: &str) -> bool {
    host == "reddit.com"
        || host.ends_with(".reddit.com")
        || host == "redd.it"
        || host.ends_with(".redd.it")
}
