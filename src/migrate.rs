use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the index schema in the configured database. Safe to re-run.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    create_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // One row per indexed chunk vector
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS vectors (
            id TEXT PRIMARY KEY,
            doc_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            category TEXT NOT NULL,
            chunk_id INTEGER NOT NULL,
            page_start INTEGER NOT NULL,
            page_end INTEGER NOT NULL,
            text TEXT NOT NULL,
            source TEXT NOT NULL,
            embedding BLOB NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_doc_id ON vectors(doc_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_vectors_category ON vectors(category)")
        .execute(pool)
        .await?;

    Ok(())
}
