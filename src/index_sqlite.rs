//! SQLite-backed [`VectorIndex`].
//!
//! Every record is one row of the `vectors` table, with its embedding
//! stored as a little-endian f32 BLOB. Filters become a `WHERE` clause over
//! whitelisted columns; the matching rows are then ranked by cosine
//! similarity in process.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use legal_lens_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use legal_lens_core::error::IndexError;
use legal_lens_core::index::{Filter, VectorIndex, FILTER_FIELDS};
use legal_lens_core::models::{VectorHit, VectorMetadata, VectorRecord};

use crate::{db, migrate};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database at `path` and ensure the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect_path(path).await?;
        migrate::create_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn count(&self) -> Result<i64, IndexError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx)
    }
}

fn map_sqlx(e: sqlx::Error) -> IndexError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => IndexError::Unavailable(e.to_string()),
        other => IndexError::Backend(other.to_string()),
    }
}

/// A bindable filter value.
enum Bind {
    Text(String),
    Int(i64),
}

/// Translate `filter` into a `WHERE` clause and its bind values.
fn where_clause(filter: &Filter) -> Result<(String, Vec<Bind>), IndexError> {
    filter.validate()?;

    let mut parts = Vec::new();
    let mut binds = Vec::new();
    for (field, value) in filter.clauses() {
        // Column names come from the whitelist only.
        let column = FILTER_FIELDS
            .iter()
            .find(|f| **f == field.as_str())
            .ok_or_else(|| IndexError::MalformedFilter(field.clone()))?;
        let bind = match value {
            Value::String(s) => Bind::Text(s.clone()),
            Value::Number(n) => Bind::Int(
                n.as_i64()
                    .ok_or_else(|| IndexError::MalformedFilter(field.clone()))?,
            ),
            _ => return Err(IndexError::MalformedFilter(field.clone())),
        };
        parts.push(format!("{} = ?", column));
        binds.push(bind);
    }

    if parts.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", parts.join(" AND ")), binds))
    }
}

fn row_to_record(row: &SqliteRow) -> Result<(String, Vec<f32>, VectorMetadata), sqlx::Error> {
    let id: String = row.try_get("id")?;
    let blob: Vec<u8> = row.try_get("embedding")?;
    let chunk_id: i64 = row.try_get("chunk_id")?;
    let page_start: i64 = row.try_get("page_start")?;
    let page_end: i64 = row.try_get("page_end")?;

    let metadata = VectorMetadata {
        doc_id: row.try_get("doc_id")?,
        user_id: row.try_get("user_id")?,
        category: row.try_get("category")?,
        chunk_id: chunk_id.max(0) as usize,
        page_start: page_start.max(0) as u32,
        page_end: page_end.max(0) as u32,
        text: row.try_get("text")?,
        source: row.try_get("source")?,
    };
    Ok((id, blob_to_vec(&blob), metadata))
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), IndexError> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;

        for rec in records {
            let md = &rec.metadata;
            sqlx::query(
                r#"
                INSERT INTO vectors (id, doc_id, user_id, category, chunk_id,
                                     page_start, page_end, text, source, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    doc_id = excluded.doc_id,
                    user_id = excluded.user_id,
                    category = excluded.category,
                    chunk_id = excluded.chunk_id,
                    page_start = excluded.page_start,
                    page_end = excluded.page_end,
                    text = excluded.text,
                    source = excluded.source,
                    embedding = excluded.embedding,
                    created_at = excluded.created_at
                "#,
            )
            .bind(&rec.id)
            .bind(&md.doc_id)
            .bind(&md.user_id)
            .bind(&md.category)
            .bind(md.chunk_id as i64)
            .bind(md.page_start as i64)
            .bind(md.page_end as i64)
            .bind(&md.text)
            .bind(&md.source)
            .bind(vec_to_blob(&rec.vector))
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<VectorHit>, IndexError> {
        let (where_sql, binds) = where_clause(filter)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, doc_id, user_id, category, chunk_id, page_start, page_end, \
             text, source, embedding FROM vectors{} ORDER BY rowid",
            where_sql
        );
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = match b {
                Bind::Text(s) => q.bind(s),
                Bind::Int(i) => q.bind(i),
            };
        }
        let rows = q.fetch_all(&self.pool).await.map_err(map_sqlx)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let (id, stored, metadata) = row_to_record(row).map_err(map_sqlx)?;
            hits.push(VectorHit {
                id,
                score: cosine_similarity(vector, &stored),
                metadata,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_by_filter(&self, field: &str, value: &str) -> Result<usize, IndexError> {
        let (where_sql, binds) = where_clause(&Filter::eq(field, value))?;

        let sql = format!("DELETE FROM vectors{}", where_sql);
        let mut q = sqlx::query(&sql);
        for b in binds {
            q = match b {
                Bind::Text(s) => q.bind(s),
                Bind::Int(i) => q.bind(i),
            };
        }
        let result = q.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_uses_whitelisted_columns() {
        let (sql, binds) =
            where_clause(&Filter::eq("doc_id", "d1").and("chunk_id", 2)).unwrap();
        assert_eq!(sql, " WHERE doc_id = ? AND chunk_id = ?");
        assert_eq!(binds.len(), 2);
    }

    #[test]
    fn test_where_clause_empty_filter() {
        let (sql, binds) = where_clause(&Filter::all()).unwrap();
        assert!(sql.is_empty());
        assert!(binds.is_empty());
    }

    #[test]
    fn test_where_clause_rejects_unknown_and_non_scalar() {
        assert!(matches!(
            where_clause(&Filter::eq("doc_id; DROP TABLE vectors", "x")),
            Err(IndexError::MalformedFilter(_))
        ));
        assert!(matches!(
            where_clause(&Filter::eq("doc_id", serde_json::json!(["a", "b"]))),
            Err(IndexError::MalformedFilter(_))
        ));
        assert!(matches!(
            where_clause(&Filter::eq("chunk_id", 1.5)),
            Err(IndexError::MalformedFilter(_))
        ));
    }
}
