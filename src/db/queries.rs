use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::models::{EntryPatch, GuestbookConfig, GuestbookEntry, NewEntry};

// ========== Entries ==========

/// Insert a new entry, returning its row ID.
pub async fn insert_entry(pool: &SqlitePool, entry: &NewEntry) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO guestbook_entries
            (record, name, website, referred_by, from_location, comments,
             private_message, flagged, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(entry.record)
    .bind(&entry.name)
    .bind(&entry.website)
    .bind(&entry.referred_by)
    .bind(&entry.from_location)
    .bind(&entry.comments)
    .bind(entry.private_message)
    .bind(entry.flagged)
    .bind(entry.status.as_str())
    .execute(pool)
    .await
    .context("Failed to insert guestbook entry")?;

    Ok(result.last_insert_rowid())
}

/// Get an entry by its record number.
pub async fn get_entry_by_record(
    pool: &SqlitePool,
    record: i64,
) -> Result<Option<GuestbookEntry>> {
    sqlx::query_as("SELECT * FROM guestbook_entries WHERE record = ?")
        .bind(record)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch entry by record")
}

/// All entries, newest record first.
pub async fn list_entries_desc(pool: &SqlitePool, limit: i64) -> Result<Vec<GuestbookEntry>> {
    sqlx::query_as("SELECT * FROM guestbook_entries ORDER BY record DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await
        .context("Failed to list entries")
}

/// Approved, non-private entries, newest record first. Powers the public view.
pub async fn list_approved_desc(pool: &SqlitePool, limit: i64) -> Result<Vec<GuestbookEntry>> {
    sqlx::query_as(
        r"
        SELECT * FROM guestbook_entries
        WHERE status = 'approved' AND private_message = 0
        ORDER BY record DESC LIMIT ?
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list approved entries")
}

/// Next record number: max existing + 1, or 1 when the table is empty.
pub async fn next_record_number(pool: &SqlitePool) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(record) FROM guestbook_entries")
        .fetch_one(pool)
        .await
        .context("Failed to read max record number")?;
    Ok(max.unwrap_or(0) + 1)
}

/// Set an entry's review status. Approval also clears the flagged marker.
pub async fn set_entry_status(pool: &SqlitePool, record: i64, status: &str) -> Result<bool> {
    let clear_flag = status == "approved";
    let result = sqlx::query(
        r"
        UPDATE guestbook_entries
        SET status = ?, flagged = CASE WHEN ? THEN 0 ELSE flagged END,
            updated_at = datetime('now')
        WHERE record = ?
        ",
    )
    .bind(status)
    .bind(clear_flag)
    .bind(record)
    .execute(pool)
    .await
    .context("Failed to update entry status")?;

    Ok(result.rows_affected() > 0)
}

/// Apply an admin edit to an entry's content fields.
pub async fn update_entry_fields(
    pool: &SqlitePool,
    record: i64,
    patch: &EntryPatch,
) -> Result<bool> {
    let result = sqlx::query(
        r"
        UPDATE guestbook_entries
        SET name = ?, website = ?, referred_by = ?, from_location = ?,
            comments = ?, private_message = ?, updated_at = datetime('now')
        WHERE record = ?
        ",
    )
    .bind(&patch.name)
    .bind(&patch.website)
    .bind(&patch.referred_by)
    .bind(&patch.from_location)
    .bind(&patch.comments)
    .bind(patch.private_message)
    .bind(record)
    .execute(pool)
    .await
    .context("Failed to update entry")?;

    Ok(result.rows_affected() > 0)
}

/// Delete an entry by record number.
pub async fn delete_entry(pool: &SqlitePool, record: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM guestbook_entries WHERE record = ?")
        .bind(record)
        .execute(pool)
        .await
        .context("Failed to delete entry")?;

    Ok(result.rows_affected() > 0)
}

// ========== Config ==========

/// Load the moderation config, falling back to defaults when the singleton
/// row has never been written.
pub async fn load_config(pool: &SqlitePool) -> Result<GuestbookConfig> {
    let row = sqlx::query("SELECT * FROM guestbook_config WHERE id = 1")
        .fetch_optional(pool)
        .await
        .context("Failed to load guestbook config")?;

    let Some(row) = row else {
        return Ok(GuestbookConfig::default());
    };

    Ok(GuestbookConfig {
        max_links: row.get("max_links"),
        max_comment_length: row.get("max_comment_length"),
        max_field_length: row.get("max_field_length"),
        banned_terms: split_terms(row.get("banned_terms")),
        require_moderation: row.get("require_moderation"),
    })
}

/// Write the moderation config (upserting the singleton row).
pub async fn update_config(pool: &SqlitePool, config: &GuestbookConfig) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO guestbook_config
            (id, max_links, max_comment_length, max_field_length, banned_terms,
             require_moderation, updated_at)
        VALUES (1, ?, ?, ?, ?, ?, datetime('now'))
        ON CONFLICT(id) DO UPDATE SET
            max_links = excluded.max_links,
            max_comment_length = excluded.max_comment_length,
            max_field_length = excluded.max_field_length,
            banned_terms = excluded.banned_terms,
            require_moderation = excluded.require_moderation,
            updated_at = excluded.updated_at
        ",
    )
    .bind(config.max_links)
    .bind(config.max_comment_length)
    .bind(config.max_field_length)
    .bind(config.banned_terms.join("\n"))
    .bind(config.require_moderation)
    .execute(pool)
    .await
    .context("Failed to update guestbook config")?;

    Ok(())
}

fn split_terms(raw: String) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}
