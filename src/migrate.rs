use anyhow::Result;
use sqlx::SqlitePool;

/// Create the index schema if it does not exist. Idempotent; safe to run
/// on every open.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    // One row per (collection, fingerprint): the chunk's identity is its
    // content hash, so re-inserting the same content is a no-op upsert.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            collection TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            source_path TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            start_offset INTEGER NOT NULL,
            end_offset INTEGER NOT NULL,
            mission TEXT NOT NULL,
            category TEXT NOT NULL,
            data_type TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (collection, fingerprint)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(collection, source_path)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_mission ON entries(collection, mission)")
        .execute(pool)
        .await?;

    Ok(())
}
