//! Usefulness scoring through an external AI classifier.
//!
//! The classifier is a narrow capability (text in, raw judgement out). The
//! [`Scorer`] owns everything this crate is responsible for: bounding the
//! call, checking the response shape, and mapping labels onto [`Category`].

mod openai;

pub use openai::OpenAiClassifier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::constants::CLASSIFIER_INPUT_LIMIT;
use crate::db::{Category, NewScore, Post};

/// Why a post could not be scored. Every variant is retriable on a later run.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier returned HTTP {0}")]
    Status(u16),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
    #[error("post has no text to score")]
    EmptyInput,
}

/// Raw classifier judgement, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub usefulness: f64,
    pub category: String,
}

/// An external text classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Model or provider name stored with each score.
    fn name(&self) -> &str;

    /// Judge the text's usefulness for a software-engineering career.
    async fn classify(&self, text: &str) -> Result<Classification, ScoringError>;
}

pub struct Scorer {
    classifier: Arc<dyn Classifier>,
    timeout: Duration,
}

impl Scorer {
    #[must_use]
    pub fn new(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    /// Score a post.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] when the classifier fails, times out, or
    /// answers with something that is not a usefulness in `[0, 1]`.
    pub async fn score(&self, post: &Post) -> Result<NewScore, ScoringError> {
        let text = truncate_chars(&post.text(), CLASSIFIER_INPUT_LIMIT);
        if text.trim().is_empty() {
            return Err(ScoringError::EmptyInput);
        }

        let classification = tokio::time::timeout(self.timeout, self.classifier.classify(&text))
            .await
            .map_err(|_| ScoringError::Timeout(self.timeout))??;

        let usefulness = classification.usefulness;
        if !usefulness.is_finite() || !(0.0..=1.0).contains(&usefulness) {
            return Err(ScoringError::Malformed(format!(
                "usefulness {usefulness} outside 0..=1"
            )));
        }

        let category = Category::from_label(&classification.category);
        debug!(
            post = %post.identity(),
            usefulness,
            category = category.as_str(),
            "Post scored"
        );

        Ok(NewScore {
            usefulness,
            category,
            model: self.classifier.name().to_string(),
        })
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
