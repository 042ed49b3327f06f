//! Link and voucher validation.

mod fetch;
mod generic;
mod registry;
mod traits;
mod udemy;

pub use fetch::{extract_plain_text, FetchOutcome, FetchedPage, PageFetcher};
pub use generic::GenericValidator;
pub use registry::ValidatorRegistry;
pub use traits::{is_voucher_link, status_verdict, LinkValidator, Verdict};
pub use udemy::UdemyValidator;

use anyhow::Result;
use tracing::debug;

use crate::config::Config;
use crate::db::{NewValidationResult, Post, ValidationStatus};

/// Fetches each link of a post and asks the matching site validator for a verdict.
pub struct Validator {
    registry: ValidatorRegistry,
    fetcher: PageFetcher,
}

impl Validator {
    #[must_use]
    pub fn new(registry: ValidatorRegistry, fetcher: PageFetcher) -> Self {
        Self { registry, fetcher }
    }

    /// Default validators with timeouts and retries from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            ValidatorRegistry::with_defaults(),
            PageFetcher::new(config.validation_timeout, config.fetch_retries)?,
        ))
    }

    /// One result per link of the post, in link order.
    ///
    /// Links are checked independently; a failing link never aborts the rest.
    pub async fn validate_post(&self, post: &Post) -> Vec<NewValidationResult> {
        let mut results = Vec::new();
        for url in post.links() {
            results.push(self.validate_url(&url).await);
        }
        results
    }

    /// Check a single link.
    pub async fn validate_url(&self, url: &str) -> NewValidationResult {
        let Some(validator) = self.registry.find(url) else {
            return NewValidationResult {
                url: url.to_string(),
                status: ValidationStatus::Unknown,
                reason: "Unsupported URL".to_string(),
                final_url: None,
                http_status: None,
            };
        };

        let result = match self.fetcher.fetch(url).await {
            FetchOutcome::Page(page) => {
                let verdict = validator.assess(url, &page);
                NewValidationResult {
                    url: url.to_string(),
                    status: verdict.status,
                    reason: verdict.reason,
                    final_url: Some(page.final_url),
                    http_status: Some(page.status),
                }
            }
            FetchOutcome::TimedOut => NewValidationResult {
                url: url.to_string(),
                status: ValidationStatus::Unknown,
                reason: format!("Timed out after {:?}", self.fetcher.timeout()),
                final_url: None,
                http_status: None,
            },
            FetchOutcome::Failed(error) => NewValidationResult {
                url: url.to_string(),
                status: ValidationStatus::Unknown,
                reason: format!("Network error - could not fetch URL: {error}"),
                final_url: None,
                http_status: None,
            },
        };

        debug!(
            url = %url,
            validator = validator.site_id(),
            status = result.status.as_str(),
            reason = %result.reason,
            "Link checked"
        );

        result
    }
}
