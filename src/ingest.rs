//! Upload, seeding, and delete pipelines.
//!
//! An upload flows: validate → store original → extract pages → chunk →
//! embed (with fallback) → upsert. Category seeding runs the same chunk and
//! embed steps over plain-text reference files, tagging the vectors
//! `source = "category"` so retrieval can fall back to them.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use legal_lens_core::chunk::chunk_pages_with;
use legal_lens_core::error::{InputError, LensError};
use legal_lens_core::index::FIELD_DOC_ID;
use legal_lens_core::models::{Chunk, Page, VectorMetadata, VectorRecord, SOURCE_CATEGORY, SOURCE_USER};

use crate::embedding::embed_or_fallback;
use crate::extract::{clean_text, extract_pages};
use crate::services::Services;

/// A single uploaded document.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub user_id: String,
    pub category: String,
    pub filename: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks_count: usize,
    /// Chunk vectors are fallback vectors, not provider embeddings.
    pub embeddings_degraded: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub files: usize,
    pub chunks: usize,
    pub degraded_files: usize,
}

/// Vector id for chunk `chunk_id` of `doc_id`.
pub fn record_id(doc_id: &str, chunk_id: usize) -> String {
    format!("{}_chunk_{}", doc_id, chunk_id)
}

/// Ingest one uploaded PDF under a freshly allocated document id.
///
/// Storage and index failures propagate. Embedding failures do not: the
/// chunks are indexed with fallback vectors and the report says so.
pub async fn ingest_document(
    services: &Services,
    request: UploadRequest,
) -> Result<IngestReport, LensError> {
    if request.bytes.is_empty() {
        return Err(InputError::Unreadable("empty upload".into()).into());
    }
    if request.user_id.trim().is_empty() {
        return Err(InputError::MissingField("user_id").into());
    }
    if request.category.trim().is_empty() {
        return Err(InputError::MissingField("category").into());
    }

    let doc_id = Uuid::new_v4().to_string();
    let location = services
        .blobs
        .put(&request.user_id, &doc_id, &request.filename, &request.bytes)
        .await?;
    tracing::debug!(doc_id = %doc_id, location = %location, "original stored");

    let pages = match extract_blocking(request.bytes).await {
        Ok(pages) => pages,
        Err(e) => {
            discard_blob(services, &request.user_id, &doc_id).await;
            return Err(e.into());
        }
    };

    let chunks = chunk_pages_with(&pages, &services.chunk_policy);
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embedded = embed_or_fallback(services.embedder.as_ref(), &texts).await;

    let records = build_records(
        &doc_id,
        &request.user_id,
        &request.category,
        SOURCE_USER,
        &chunks,
        embedded.value,
    );
    if let Err(e) = services.index.upsert(&records).await {
        discard_blob(services, &request.user_id, &doc_id).await;
        return Err(e.into());
    }

    tracing::info!(
        doc_id = %doc_id,
        user_id = %request.user_id,
        category = %request.category,
        filename = %request.filename,
        pages = pages.len(),
        chunks = chunks.len(),
        degraded = embedded.degraded,
        "document indexed"
    );

    Ok(IngestReport {
        doc_id,
        chunks_count: chunks.len(),
        embeddings_degraded: embedded.degraded,
    })
}

/// Run PDF extraction off the async runtime. A panic inside the PDF parser
/// is reported as an unreadable document.
async fn extract_blocking(bytes: Vec<u8>) -> Result<Vec<Page>, InputError> {
    match tokio::task::spawn_blocking(move || extract_pages(&bytes)).await {
        Ok(result) => result,
        Err(e) => Err(InputError::Unreadable(format!("PDF parser failed: {}", e))),
    }
}

async fn discard_blob(services: &Services, user_id: &str, doc_id: &str) {
    if let Err(e) = services.blobs.delete(user_id, doc_id).await {
        tracing::warn!(doc_id, error = %e, "failed to remove stored original");
    }
}

fn build_records(
    doc_id: &str,
    user_id: &str,
    category: &str,
    source: &str,
    chunks: &[Chunk],
    vectors: Vec<Vec<f32>>,
) -> Vec<VectorRecord> {
    chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| VectorRecord {
            id: record_id(doc_id, chunk.chunk_id),
            vector,
            metadata: VectorMetadata {
                doc_id: doc_id.to_string(),
                user_id: user_id.to_string(),
                category: category.to_string(),
                chunk_id: chunk.chunk_id,
                page_start: chunk.page_start,
                page_end: chunk.page_end,
                text: chunk.text.clone(),
                source: source.to_string(),
            },
        })
        .collect()
}

/// Index every `*.txt` file directly inside `dir` as category reference
/// material. Each file becomes one single-page document whose id is the
/// file stem.
pub async fn seed_category(services: &Services, category: &str, dir: &Path) -> Result<SeedReport> {
    if category.trim().is_empty() {
        return Err(LensError::from(InputError::MissingField("category")).into());
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    let mut report = SeedReport::default();
    for path in &files {
        let doc_id = match path.file_stem() {
            Some(stem) => stem.to_string_lossy().to_string(),
            None => continue,
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let text = clean_text(&raw);
        if text.is_empty() {
            tracing::warn!(file = %path.display(), "skipping empty reference file");
            continue;
        }

        let chunks = chunk_pages_with(&[Page::new(1, text)], &services.chunk_policy);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embedded = embed_or_fallback(services.embedder.as_ref(), &texts).await;

        let records = build_records(
            &doc_id,
            "",
            category,
            SOURCE_CATEGORY,
            &chunks,
            embedded.value,
        );
        services
            .index
            .upsert(&records)
            .await
            .map_err(LensError::from)
            .with_context(|| format!("Failed to index {}", path.display()))?;

        tracing::info!(doc_id = %doc_id, category, chunks = chunks.len(), "reference file seeded");

        report.files += 1;
        report.chunks += chunks.len();
        if embedded.degraded {
            report.degraded_files += 1;
        }
    }

    Ok(report)
}

/// Remove every vector of `doc_id` and, given the owning `user_id`, the
/// stored original. Returns the number of vectors removed. When no vector
/// matched, the stored original is left alone.
pub async fn delete_document(
    services: &Services,
    doc_id: &str,
    user_id: Option<&str>,
) -> Result<usize, LensError> {
    if doc_id.trim().is_empty() {
        return Err(InputError::MissingField("doc_id").into());
    }

    let removed = services.index.delete_by_filter(FIELD_DOC_ID, doc_id).await?;
    if let Some(user_id) = user_id.filter(|_| removed > 0) {
        services.blobs.delete(user_id, doc_id).await?;
    }

    tracing::info!(doc_id, vectors = removed, "document deleted");
    Ok(removed)
}
