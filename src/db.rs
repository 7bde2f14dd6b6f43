use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::IngestError;

/// Open (or create) the SQLite store backing the vector index.
///
/// Any failure here is [`IngestError::IndexUnavailable`]: a fatal
/// precondition surfaced before the pipeline does any work.
pub async fn connect(path: &Path) -> Result<SqlitePool, IngestError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| unavailable(path, &e))?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
        .map_err(|e| unavailable(path, &e))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| unavailable(path, &e))?;

    Ok(pool)
}

fn unavailable(path: &Path, err: &dyn std::fmt::Display) -> IngestError {
    IngestError::IndexUnavailable {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
