//! Alert delivery with at-most-once semantics per (post, channel).

mod email;
mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::{self, Category, Channel, Post};
use crate::dedup::Deduplicator;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by provider: {0}")]
    Rejected(String),
}

/// Everything a channel needs to describe one worthwhile post.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub identity: String,
    pub title: String,
    pub permalink: Option<String>,
    pub usefulness: f64,
    pub category: Category,
    pub links: Vec<String>,
}

impl Alert {
    #[must_use]
    pub fn new(post: &Post, usefulness: f64, category: Category, links: Vec<String>) -> Self {
        Self {
            identity: post.identity(),
            title: post
                .title
                .clone()
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "(untitled post)".to_string()),
            permalink: post.permalink.clone(),
            usefulness,
            category,
            links,
        }
    }

    #[must_use]
    pub fn subject(&self) -> String {
        format!("Free course: {}", self.title)
    }

    /// Plain-text body shared by all channels.
    #[must_use]
    pub fn body(&self) -> String {
        let mut out = format!(
            "{}\nCategory: {}\nUsefulness: {:.2}\n",
            self.title,
            self.category.as_str(),
            self.usefulness
        );
        for link in &self.links {
            out.push('\n');
            out.push_str(link);
        }
        if let Some(permalink) = &self.permalink {
            out.push_str("\n\nDiscussion: ");
            out.push_str(permalink);
        }
        out
    }
}

/// A destination for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn channel(&self) -> Channel;

    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// What happened on one channel for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    AlreadyNotified,
    /// Another run holds the claim; left for a later run.
    Busy,
    Failed(String),
}

pub struct Notifier {
    pool: SqlitePool,
    dedup: Deduplicator,
    channels: Vec<Arc<dyn NotificationChannel>>,
    timeout: Duration,
    claim_stale_after: Duration,
}

impl Notifier {
    #[must_use]
    pub fn new(
        pool: SqlitePool,
        channels: Vec<Arc<dyn NotificationChannel>>,
        timeout: Duration,
        claim_stale_after: Duration,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(pool.clone()),
            pool,
            channels,
            timeout,
            claim_stale_after,
        }
    }

    /// Build the channels enabled in configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an enabled channel lacks credentials or has an
    /// unparseable address.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<Self> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        for channel in &config.channels {
            match channel {
                Channel::Telegram => {
                    let telegram = config
                        .telegram
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("Telegram enabled without credentials"))?;
                    channels.push(Arc::new(TelegramChannel::new(telegram, config.notify_timeout)?));
                }
                Channel::Email => {
                    let email = config
                        .email
                        .as_ref()
                        .ok_or_else(|| anyhow::anyhow!("Email enabled without SMTP settings"))?;
                    channels.push(Arc::new(EmailChannel::new(email, config.notify_timeout)?));
                }
            }
        }
        Ok(Self::new(
            pool,
            channels,
            config.notify_timeout,
            config.claim_stale_after,
        ))
    }

    #[must_use]
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.channel()).collect()
    }

    /// Deliver the alert on every channel that has not yet carried it.
    ///
    /// # Errors
    ///
    /// Returns an error only on database failures; send failures are
    /// reported as [`NotifyOutcome::Failed`].
    pub async fn notify(&self, post_id: i64, alert: &Alert) -> Result<Vec<(Channel, NotifyOutcome)>> {
        let mut outcomes = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let outcome = self.notify_channel(post_id, channel.as_ref(), alert).await?;
            outcomes.push((channel.channel(), outcome));
        }
        Ok(outcomes)
    }

    async fn notify_channel(
        &self,
        post_id: i64,
        channel: &dyn NotificationChannel,
        alert: &Alert,
    ) -> Result<NotifyOutcome> {
        let kind = channel.channel();

        if self.dedup.already_notified(post_id, kind).await? {
            return Ok(NotifyOutcome::AlreadyNotified);
        }

        if !db::try_claim_notification(&self.pool, post_id, kind, self.claim_stale_after).await? {
            debug!(post = %alert.identity, channel = %kind, "Claim held by another run");
            return Ok(NotifyOutcome::Busy);
        }

        let outcome = self.send_claimed(post_id, channel, alert).await;
        let released = db::release_notification_claim(&self.pool, post_id, kind).await;
        let outcome = outcome?;
        released?;
        Ok(outcome)
    }

    /// Check, send and record while holding the claim.
    async fn send_claimed(
        &self,
        post_id: i64,
        channel: &dyn NotificationChannel,
        alert: &Alert,
    ) -> Result<NotifyOutcome> {
        let kind = channel.channel();

        // A run that finished between our first check and the claim.
        if self.dedup.already_notified(post_id, kind).await? {
            return Ok(NotifyOutcome::AlreadyNotified);
        }

        let sent = match tokio::time::timeout(self.timeout, channel.send(alert)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(self.timeout)),
        };

        if let Err(e) = sent {
            warn!(post = %alert.identity, channel = %kind, error = %e, "Alert not sent");
            return Ok(NotifyOutcome::Failed(e.to_string()));
        }

        if self.dedup.record(post_id, kind).await? {
            info!(post = %alert.identity, channel = %kind, "Alert sent");
            Ok(NotifyOutcome::Sent)
        } else {
            Ok(NotifyOutcome::AlreadyNotified)
        }
    }
}
