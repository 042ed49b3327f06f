//! One discovery pass: collect, validate, score, notify.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::collect::{Collector, RedditCollector};
use crate::config::Config;
use crate::constants::CANDIDATE_BATCH_LIMIT;
use crate::db::{self, Database, Post, ValidationStatus};
use crate::notify::{Alert, Notifier, NotifyOutcome};
use crate::score::{OpenAiClassifier, Scorer};
use crate::validate::Validator;

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub fetched: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub collector_errors: usize,
    pub candidates: usize,
    pub links_valid: usize,
    pub links_invalid: usize,
    pub links_unknown: usize,
    pub no_valid_link: usize,
    pub scored: usize,
    pub scoring_failures: usize,
    pub below_threshold: usize,
    pub sent: usize,
    pub already_notified: usize,
    pub busy: usize,
    pub send_failures: usize,
    pub item_errors: usize,
}

impl RunSummary {
    fn record_link(&mut self, status: ValidationStatus) {
        match status {
            ValidationStatus::Valid => self.links_valid += 1,
            ValidationStatus::Invalid => self.links_invalid += 1,
            ValidationStatus::Unknown => self.links_unknown += 1,
        }
    }

    fn record_notification(&mut self, outcome: &NotifyOutcome) {
        match outcome {
            NotifyOutcome::Sent => self.sent += 1,
            NotifyOutcome::AlreadyNotified => self.already_notified += 1,
            NotifyOutcome::Busy => self.busy += 1,
            NotifyOutcome::Failed(_) => self.send_failures += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched {} ({} new, {} duplicate), {} candidates ({} without a valid link), \
             links {} valid / {} invalid / {} unknown, \
             scored {} ({} failed, {} below threshold), \
             sent {} ({} already sent, {} busy, {} failed), {} errors",
            self.fetched,
            self.inserted,
            self.duplicates,
            self.candidates,
            self.no_valid_link,
            self.links_valid,
            self.links_invalid,
            self.links_unknown,
            self.scored,
            self.scoring_failures,
            self.below_threshold,
            self.sent,
            self.already_notified,
            self.busy,
            self.send_failures,
            self.item_errors + self.collector_errors,
        )
    }
}

pub struct Pipeline {
    db: Database,
    collectors: Vec<Box<dyn Collector>>,
    validator: Validator,
    scorer: Scorer,
    notifier: Notifier,
    threshold: f64,
    lookback: Duration,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        db: Database,
        collectors: Vec<Box<dyn Collector>>,
        validator: Validator,
        scorer: Scorer,
        notifier: Notifier,
        threshold: f64,
        lookback: Duration,
    ) -> Self {
        Self {
            db,
            collectors,
            validator,
            scorer,
            notifier,
            threshold,
            lookback,
        }
    }

    /// Wire the production components.
    ///
    /// # Errors
    ///
    /// Returns an error if any HTTP client or notification channel cannot be built.
    pub fn from_config(db: Database, config: &Config) -> Result<Self> {
        let collectors: Vec<Box<dyn Collector>> = vec![Box::new(RedditCollector::new(config)?)];
        let validator = Validator::from_config(config)?;
        let scorer = Scorer::new(
            Arc::new(OpenAiClassifier::from_config(config)?),
            config.ai_timeout,
        );
        let notifier = Notifier::from_config(db.pool().clone(), config)?;

        Ok(Self::new(
            db,
            collectors,
            validator,
            scorer,
            notifier,
            config.usefulness_threshold,
            config.lookback,
        ))
    }

    /// Perform one pass.
    ///
    /// Failures of a single collector or post are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns an error only if candidate posts cannot be loaded.
    pub async fn run_once(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        self.collect(&mut summary).await;

        let channels = self.notifier.channels();
        let candidates = db::get_candidate_posts(
            self.db.pool(),
            self.lookback,
            &channels,
            self.threshold,
            CANDIDATE_BATCH_LIMIT,
        )
        .await
        .context("Failed to load candidate posts")?;
        summary.candidates = candidates.len();
        debug!(count = candidates.len(), "Processing candidate posts");

        for post in &candidates {
            if let Err(e) = self.process_post(post, &mut summary).await {
                error!(post = %post.identity(), "Failed to process post: {e:#}");
                summary.item_errors += 1;
            }
        }

        info!(
            fetched = summary.fetched,
            inserted = summary.inserted,
            candidates = summary.candidates,
            sent = summary.sent,
            errors = summary.item_errors + summary.collector_errors,
            "Run complete"
        );

        Ok(summary)
    }

    async fn collect(&self, summary: &mut RunSummary) {
        for collector in &self.collectors {
            let posts = match collector.collect().await {
                Ok(posts) => posts,
                Err(e) => {
                    error!(source = collector.source(), "Collector failed: {e:#}");
                    summary.collector_errors += 1;
                    continue;
                }
            };

            summary.fetched += posts.len();
            for post in &posts {
                match db::upsert_post(self.db.pool(), post).await {
                    Ok(outcome) if outcome.inserted => summary.inserted += 1,
                    Ok(_) => summary.duplicates += 1,
                    Err(e) => {
                        error!(
                            source = %post.source,
                            source_id = %post.source_id,
                            "Failed to store post: {e:#}"
                        );
                        summary.item_errors += 1;
                    }
                }
            }
        }
    }

    async fn process_post(&self, post: &Post, summary: &mut RunSummary) -> Result<()> {
        let pool = self.db.pool();

        let results = self.validator.validate_post(post).await;
        let mut valid_links = Vec::new();
        for result in &results {
            db::insert_validation_result(pool, post.id, result).await?;
            summary.record_link(result.status);
            if result.status == ValidationStatus::Valid {
                valid_links.push(result.url.clone());
            }
        }

        if valid_links.is_empty() {
            debug!(post = %post.identity(), links = results.len(), "No valid link");
            summary.no_valid_link += 1;
            return Ok(());
        }

        let (usefulness, category) = if let Some(score) = db::get_score(pool, post.id).await? {
            (score.usefulness, score.category_enum())
        } else {
            match self.scorer.score(post).await {
                Ok(score) => {
                    db::set_score(pool, post.id, &score).await?;
                    summary.scored += 1;
                    (score.usefulness, score.category)
                }
                Err(e) => {
                    warn!(post = %post.identity(), error = %e, "Scoring failed, will retry next run");
                    summary.scoring_failures += 1;
                    return Ok(());
                }
            }
        };

        if usefulness < self.threshold {
            debug!(post = %post.identity(), usefulness, "Below threshold");
            summary.below_threshold += 1;
            return Ok(());
        }

        let alert = Alert::new(post, usefulness, category, valid_links);
        for (_, outcome) in self.notifier.notify(post.id, &alert).await? {
            summary.record_notification(&outcome);
        }

        Ok(())
    }
}
