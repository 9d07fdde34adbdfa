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

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema_migrations table")?;
    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: Option<i64> =
        sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(pool)
            .await
            .context("Failed to read schema version")?;
    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i64) -> Result<()> {
    sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .context("Failed to record schema version")?;
    Ok(())
}

/// v1: guestbook entries and the singleton moderation config.
async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE guestbook_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record INTEGER NOT NULL UNIQUE,
            name TEXT NOT NULL,
            website TEXT NOT NULL DEFAULT '',
            referred_by TEXT NOT NULL DEFAULT '',
            from_location TEXT NOT NULL DEFAULT '',
            comments TEXT NOT NULL,
            private_message INTEGER NOT NULL DEFAULT 0,
            flagged INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create guestbook_entries table")?;

    sqlx::query("CREATE INDEX idx_entries_status ON guestbook_entries(status)")
        .execute(pool)
        .await
        .context("Failed to create status index")?;

    sqlx::query(
        r"
        CREATE TABLE guestbook_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            max_links INTEGER NOT NULL DEFAULT 2,
            max_comment_length INTEGER NOT NULL DEFAULT 800,
            max_field_length INTEGER NOT NULL DEFAULT 120,
            banned_terms TEXT NOT NULL DEFAULT '',
            require_moderation INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create guestbook_config table")?;

    Ok(())
}
