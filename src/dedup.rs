//! The "already alerted?" decision.
//!
//! A notification record for `(post, channel)` is the only dedup signal. The
//! unique constraint on that pair makes [`Deduplicator::record`] safe to race.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::db::{self, Channel};

#[derive(Debug, Clone)]
pub struct Deduplicator {
    pool: SqlitePool,
}

impl Deduplicator {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether the post was already alerted on `channel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub async fn already_notified(&self, post_id: i64, channel: Channel) -> Result<bool> {
        db::has_notification(&self.pool, post_id, channel).await
    }

    /// Channels from `channels` that have not yet carried the post.
    ///
    /// # Errors
    ///
    /// Returns an error if a lookup fails.
    pub async fn pending_channels(&self, post_id: i64, channels: &[Channel]) -> Result<Vec<Channel>> {
        let mut pending = Vec::new();
        for &channel in channels {
            if !self.already_notified(post_id, channel).await? {
                pending.push(channel);
            }
        }
        Ok(pending)
    }

    /// Record a delivered alert. `false` means another run recorded it first.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails for any reason other than a duplicate.
    pub async fn record(&self, post_id: i64, channel: Channel) -> Result<bool> {
        db::insert_notification(&self.pool, post_id, channel).await
    }
}
