use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    // Posts table
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            source_id TEXT NOT NULL,
            community TEXT,
            title TEXT,
            body TEXT,
            author TEXT,
            permalink TEXT,
            links_json TEXT NOT NULL DEFAULT '[]',
            published_at TEXT,
            discovered_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(source, source_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    // Validation results table (append-only)
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS validation_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            url TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('VALID', 'INVALID', 'UNKNOWN')),
            reason TEXT NOT NULL,
            final_url TEXT,
            http_status INTEGER,
            checked_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create validation_results table")?;

    // Scores table (one row per post)
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS scores (
            post_id INTEGER PRIMARY KEY REFERENCES posts(id),
            usefulness REAL NOT NULL,
            category TEXT NOT NULL,
            model TEXT NOT NULL,
            produced_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create scores table")?;

    // Notifications table; the unique pair is the dedup signal
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS notifications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id),
            channel TEXT NOT NULL,
            sent_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(post_id, channel)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create notifications table")?;

    // Indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_validation_results_post ON validation_results(post_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_discovered ON posts(discovered_at)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v2: adding notification claims");

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS notification_claims (
            post_id INTEGER NOT NULL REFERENCES posts(id),
            channel TEXT NOT NULL,
            claimed_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (post_id, channel)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create notification_claims table")?;

    Ok(())
}
