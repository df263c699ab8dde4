//! Embedding provider trait and vector utilities.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `legal-lens`
//! application crate. This module holds the [`Embedder`] seam plus pure
//! helpers for similarity, BLOB encoding, and the deterministic fallback
//! vector used when a provider fails.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::EmbedError;

/// Trait for embedding providers.
///
/// `embed` returns one vector per input text, in input order, each of
/// length [`dims`](Embedder::dims).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// ```rust
/// use legal_lens_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial words are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-magnitude operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Deterministic pseudo-random unit vector for `text`.
///
/// Components are drawn from SHA-256 in counter mode: the seed is the
/// digest of `text`, and block `i` is `SHA-256(seed || i as u32 LE)`, read
/// as little-endian `u32` words mapped onto `[-1, 1]`. The result is
/// normalized to unit length. Identical text always yields the identical
/// vector, across runs and platforms.
///
/// ```rust
/// use legal_lens_core::embedding::fallback_vector;
///
/// let v = fallback_vector("Loan amount is $5000.", 16);
/// assert_eq!(v.len(), 16);
/// assert_eq!(v, fallback_vector("Loan amount is $5000.", 16));
/// ```
pub fn fallback_vector(text: &str, dims: usize) -> Vec<f32> {
    let seed = Sha256::digest(text.as_bytes());

    let mut out = Vec::with_capacity(dims);
    let mut block: u32 = 0;
    while out.len() < dims {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(block.to_le_bytes());
        let digest = hasher.finalize();

        for word in digest.chunks_exact(4) {
            if out.len() == dims {
                break;
            }
            let bits = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
            out.push((bits as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32);
        }
        block = block.wrapping_add(1);
    }

    let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in out.iter_mut() {
            *x /= norm;
        }
    }
    out
}
