//! Post collection from social sources.

mod link_extractor;
mod normalize;
pub mod reddit;

pub use link_extractor::{extract_html_links, extract_urls};
pub use normalize::{bare_host, normalize_url};
pub use reddit::RedditCollector;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::NewPost;

/// A source of posts.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source name stored with every post, e.g. `reddit`.
    fn source(&self) -> &'static str;

    /// Fetch the current batch of posts.
    ///
    /// Partial failures (one listing of several) are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error only when nothing could be fetched at all.
    async fn collect(&self) -> Result<Vec<NewPost>>;
}
