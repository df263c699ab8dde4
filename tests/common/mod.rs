//! Shared fixtures for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};

use legal_lens::services::Services;
use legal_lens::storage::LocalBlobStore;
use legal_lens_core::embedding::{fallback_vector, Embedder};
use legal_lens_core::error::{EmbedError, GenerateError};
use legal_lens_core::generate::AnswerGenerator;
use legal_lens_core::index::{InMemoryIndex, VectorIndex};
use legal_lens_core::models::{VectorMetadata, VectorRecord};

pub const DIMS: usize = 256;

/// Minimal valid PDF with one page per entry of `pages`, each showing its
/// text in Helvetica. Offsets in the xref table are computed, so
/// pdf-extract can parse it.
pub fn minimal_pdf(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let font_id = 3;
    let page_id = |i: usize| 4 + 2 * i;
    let content_id = |i: usize| 5 + 2 * i;
    let total = 3 + 2 * n;

    let mut out = Vec::new();
    let mut offsets = vec![0usize; total + 1];
    out.extend_from_slice(b"%PDF-1.4\n");

    offsets[1] = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    offsets[2] = out.len();
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", page_id(i))).collect();
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    offsets[font_id] = out.len();
    out.extend_from_slice(
        b"3 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );

    for (i, text) in pages.iter().enumerate() {
        offsets[page_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >> endobj\n",
                page_id(i),
                content_id(i)
            )
            .as_bytes(),
        );

        let stream = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
        offsets[content_id(i)] = out.len();
        out.extend_from_slice(
            format!(
                "{} 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                content_id(i),
                stream.len(),
                stream
            )
            .as_bytes(),
        );
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", total + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets.iter().skip(1) {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {} /Root 1 0 R >>\nstartxref\n", total + 1).as_bytes(),
    );
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Bag-of-words embedder: the normalized sum of a fixed vector per
/// lowercase word. Texts sharing words score higher.
pub struct WordEmbedder;

pub fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text.split_whitespace() {
        let word: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if word.is_empty() {
            continue;
        }
        for (acc, x) in v.iter_mut().zip(fallback_vector(&word, DIMS)) {
            *acc += x;
        }
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

#[async_trait]
impl Embedder for WordEmbedder {
    fn model_name(&self) -> &str {
        "words"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| embed_words(t)).collect())
    }
}

/// Returns a fixed answer and keeps the last instruction it was given.
#[derive(Default)]
pub struct RecordingGenerator {
    pub fail: bool,
    pub last_instruction: Mutex<Option<String>>,
}

impl RecordingGenerator {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last(&self) -> Option<String> {
        self.last_instruction.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn generate(&self, instruction: &str) -> Result<String, GenerateError> {
        *self.last_instruction.lock().unwrap() = Some(instruction.to_string());
        if self.fail {
            return Err(GenerateError::Request("connection refused".into()));
        }
        Ok("**Answer:** see clause 4.".to_string())
    }
}

pub struct Harness {
    pub services: Services,
    pub index: Arc<InMemoryIndex>,
    pub generator: Arc<RecordingGenerator>,
}

/// In-memory index, word embedder, recording generator, and blob storage
/// under `root`.
pub fn harness(root: &Path, generator: RecordingGenerator) -> Harness {
    let index = Arc::new(InMemoryIndex::new());
    let generator = Arc::new(generator);
    let services = Services::new(
        index.clone(),
        Arc::new(WordEmbedder),
        generator.clone(),
        Arc::new(LocalBlobStore::new(root)),
    );
    Harness {
        services,
        index,
        generator,
    }
}

/// Index `texts` as chunks 0.. of a user document.
pub async fn index_user_doc(
    index: &dyn VectorIndex,
    doc_id: &str,
    user_id: &str,
    category: &str,
    texts: &[&str],
) {
    let records: Vec<VectorRecord> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| VectorRecord {
            id: format!("{}_chunk_{}", doc_id, i),
            vector: embed_words(text),
            metadata: VectorMetadata {
                doc_id: doc_id.to_string(),
                user_id: user_id.to_string(),
                category: category.to_string(),
                chunk_id: i,
                page_start: i as u32 + 1,
                page_end: i as u32 + 1,
                text: text.to_string(),
                source: "user".to_string(),
            },
        })
        .collect();
    index.upsert(&records).await.unwrap();
}
