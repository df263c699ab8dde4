//! SQLite connection management.
//!
//! The index database file and its parent directories are created on
//! first connect. WAL mode lets the HTTP server answer questions while an
//! upload is being written.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::config::Config;

/// Open a pool on the configured index database.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    connect_path(&config.index.path).await
}

/// Open a pool on the SQLite file at `db_path`, creating it if missing.
pub async fn connect_path(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
