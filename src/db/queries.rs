use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{
    Channel, NewPost, NewScore, NewValidationResult, NotificationRecord, Post, Score,
    UpsertOutcome, ValidationResult,
};

/// SQLite `datetime()` modifier for "this long ago".
fn ago_modifier(age: Duration) -> String {
    format!("-{} seconds", age.as_secs())
}

// ========== Posts ==========

/// Insert a post unless one with the same `(source, source_id)` exists.
///
/// Existing rows are left untouched, so re-collecting a post is a no-op.
pub async fn upsert_post(pool: &SqlitePool, post: &NewPost) -> Result<UpsertOutcome> {
    let links_json = serde_json::to_string(&post.links).context("Failed to encode links")?;

    let result = sqlx::query(
        r"
        INSERT INTO posts (source, source_id, community, title, body, author, permalink,
                           links_json, published_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, source_id) DO NOTHING
        ",
    )
    .bind(&post.source)
    .bind(&post.source_id)
    .bind(&post.community)
    .bind(&post.title)
    .bind(&post.body)
    .bind(&post.author)
    .bind(&post.permalink)
    .bind(&links_json)
    .bind(&post.published_at)
    .execute(pool)
    .await
    .context("Failed to upsert post")?;

    if result.rows_affected() == 1 {
        return Ok(UpsertOutcome {
            post_id: result.last_insert_rowid(),
            inserted: true,
        });
    }

    let (post_id,): (i64,) =
        sqlx::query_as("SELECT id FROM posts WHERE source = ? AND source_id = ?")
            .bind(&post.source)
            .bind(&post.source_id)
            .fetch_one(pool)
            .await
            .context("Failed to look up existing post")?;

    Ok(UpsertOutcome {
        post_id,
        inserted: false,
    })
}

/// Get a post by row ID.
pub async fn get_post(pool: &SqlitePool, id: i64) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")
}

/// Get a post by its identity.
pub async fn get_post_by_identity(
    pool: &SqlitePool,
    source: &str,
    source_id: &str,
) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE source = ? AND source_id = ?")
        .bind(source)
        .bind(source_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by identity")
}

/// Count stored posts.
pub async fn count_posts(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    Ok(count)
}

/// Posts worth another pass this run.
///
/// A post qualifies when it was discovered within `lookback`, has not been
/// notified on every channel in `channels`, and has not already been scored
/// below `threshold`.
pub async fn get_candidate_posts(
    pool: &SqlitePool,
    lookback: Duration,
    channels: &[Channel],
    threshold: f64,
    limit: i64,
) -> Result<Vec<Post>> {
    if channels.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; channels.len()].join(", ");
    let sql = format!(
        r"
        SELECT p.*
        FROM posts p
        LEFT JOIN scores s ON s.post_id = p.id
        WHERE p.discovered_at >= datetime('now', ?)
          AND (s.post_id IS NULL OR s.usefulness >= ?)
          AND (
              SELECT COUNT(DISTINCT n.channel)
              FROM notifications n
              WHERE n.post_id = p.id AND n.channel IN ({placeholders})
          ) < ?
        ORDER BY p.id ASC
        LIMIT ?
        "
    );

    let mut query = sqlx::query_as::<_, Post>(&sql)
        .bind(ago_modifier(lookback))
        .bind(threshold);
    for channel in channels {
        query = query.bind(channel.as_str());
    }

    query
        .bind(channels.len() as i64)
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to fetch candidate posts")
}

// ========== Validation Results ==========

/// Append a validation result for a post.
pub async fn insert_validation_result(
    pool: &SqlitePool,
    post_id: i64,
    result: &NewValidationResult,
) -> Result<i64> {
    let inserted = sqlx::query(
        r"
        INSERT INTO validation_results (post_id, url, status, reason, final_url, http_status)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(post_id)
    .bind(&result.url)
    .bind(result.status.as_str())
    .bind(&result.reason)
    .bind(&result.final_url)
    .bind(result.http_status.map(i64::from))
    .execute(pool)
    .await
    .context("Failed to insert validation result")?;

    Ok(inserted.last_insert_rowid())
}

/// All validation results for a post, oldest first.
pub async fn get_validation_results(pool: &SqlitePool, post_id: i64) -> Result<Vec<ValidationResult>> {
    sqlx::query_as("SELECT * FROM validation_results WHERE post_id = ? ORDER BY id ASC")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch validation results")
}

/// Count stored validation results.
pub async fn count_validation_results(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM validation_results")
        .fetch_one(pool)
        .await
        .context("Failed to count validation results")?;
    Ok(count)
}

// ========== Scores ==========

/// Set the score for a post, overwriting any previous score.
pub async fn set_score(pool: &SqlitePool, post_id: i64, score: &NewScore) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO scores (post_id, usefulness, category, model)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(post_id) DO UPDATE SET
            usefulness = excluded.usefulness,
            category = excluded.category,
            model = excluded.model,
            produced_at = datetime('now')
        ",
    )
    .bind(post_id)
    .bind(score.usefulness)
    .bind(score.category.as_str())
    .bind(&score.model)
    .execute(pool)
    .await
    .context("Failed to set score")?;

    Ok(())
}

/// Get the score for a post.
pub async fn get_score(pool: &SqlitePool, post_id: i64) -> Result<Option<Score>> {
    sqlx::query_as("SELECT * FROM scores WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch score")
}

// ========== Notifications ==========

/// Check whether a post was already notified on a channel.
pub async fn has_notification(pool: &SqlitePool, post_id: i64, channel: Channel) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM notifications WHERE post_id = ? AND channel = ? LIMIT 1")
            .bind(post_id)
            .bind(channel.as_str())
            .fetch_optional(pool)
            .await
            .context("Failed to check notification")?;

    Ok(row.is_some())
}

/// Record that a post was notified on a channel.
///
/// Returns `false` if a record already existed; the existing row wins.
pub async fn insert_notification(pool: &SqlitePool, post_id: i64, channel: Channel) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO notifications (post_id, channel)
        VALUES (?, ?)
        ON CONFLICT(post_id, channel) DO NOTHING
        ",
    )
    .bind(post_id)
    .bind(channel.as_str())
    .execute(pool)
    .await
    .context("Failed to insert notification")?;

    Ok(result.rows_affected() == 1)
}

/// All notification records for a post.
pub async fn get_notifications_for_post(
    pool: &SqlitePool,
    post_id: i64,
) -> Result<Vec<NotificationRecord>> {
    sqlx::query_as("SELECT * FROM notifications WHERE post_id = ? ORDER BY id ASC")
        .bind(post_id)
        .fetch_all(pool)
        .await
        .context("Failed to fetch notifications")
}

/// Count stored notification records.
pub async fn count_notifications(pool: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
        .fetch_one(pool)
        .await
        .context("Failed to count notifications")?;
    Ok(count)
}

/// Try to take the send lock for `(post_id, channel)`.
///
/// Succeeds when no claim exists or the existing claim is older than
/// `stale_after` (its holder is assumed to have crashed).
pub async fn try_claim_notification(
    pool: &SqlitePool,
    post_id: i64,
    channel: Channel,
    stale_after: Duration,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO notification_claims (post_id, channel)
        VALUES (?, ?)
        ON CONFLICT(post_id, channel) DO UPDATE SET claimed_at = datetime('now')
        WHERE notification_claims.claimed_at <= datetime('now', ?)
        ",
    )
    .bind(post_id)
    .bind(channel.as_str())
    .bind(ago_modifier(stale_after))
    .execute(pool)
    .await
    .context("Failed to claim notification")?;

    Ok(result.rows_affected() == 1)
}

/// Release the send lock for `(post_id, channel)`.
pub async fn release_notification_claim(
    pool: &SqlitePool,
    post_id: i64,
    channel: Channel,
) -> Result<()> {
    sqlx::query("DELETE FROM notification_claims WHERE post_id = ? AND channel = ?")
        .bind(post_id)
        .bind(channel.as_str())
        .execute(pool)
        .await
        .context("Failed to release notification claim")?;
    Ok(())
}
