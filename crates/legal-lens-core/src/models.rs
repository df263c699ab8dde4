//! Core data models shared by the chunker, the index contract, the
//! retriever, and the context assembler.

use serde::{Deserialize, Serialize};

/// `source` tag stored on vectors produced from a user's upload.
pub const SOURCE_USER: &str = "user";
/// `source` tag stored on seeded category reference vectors.
pub const SOURCE_CATEGORY: &str = "category";

/// One page of extracted document text. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub text: String,
}

impl Page {
    pub fn new(number: u32, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// A bounded span of document text, the unit of indexing and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Dense 0-based position in the document's final chunk order.
    pub chunk_id: usize,
    pub text: String,
    /// Inclusive page range the text was drawn from.
    pub page_start: u32,
    pub page_end: u32,
    /// Estimated token count of `text`.
    pub tokens: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// Metadata stored alongside every indexed vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub doc_id: String,
    pub user_id: String,
    pub category: String,
    pub chunk_id: usize,
    pub page_start: u32,
    pub page_end: u32,
    pub text: String,
    pub source: String,
}

/// A chunk embedding plus its metadata, as handed to the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// One ranked result of a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    /// Cosine-like similarity, higher is better.
    pub score: f32,
    pub metadata: VectorMetadata,
}

/// Which retrieval scope produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    User,
    Category,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::User => "user",
            MatchSource::Category => "category",
        }
    }
}

/// A similarity hit annotated by the retriever with the scope it came from.
///
/// Built fresh from each [`VectorHit`]; the index's metadata is never
/// mutated to carry the score or the scope.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedMatch {
    pub id: String,
    pub score: f32,
    pub source: MatchSource,
    pub metadata: VectorMetadata,
}

impl RetrievedMatch {
    pub fn from_hit(hit: VectorHit, source: MatchSource) -> Self {
        Self {
            id: hit.id,
            score: hit.score,
            source,
            metadata: hit.metadata,
        }
    }

    pub fn text(&self) -> &str {
        &self.metadata.text
    }

    /// Returns `true` when the match carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.metadata.text.trim().is_empty()
    }
}

/// The matches selected for a single answer request, in prompt order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    pub user: Vec<RetrievedMatch>,
    pub category: Vec<RetrievedMatch>,
}

impl PromptContext {
    /// Highest score across both scopes, or `0.0` when nothing was selected.
    pub fn confidence(&self) -> f32 {
        self.user
            .iter()
            .chain(self.category.iter())
            .map(|m| m.score)
            .reduce(f32::max)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.category.is_empty()
    }

    /// All selected matches, user scope first.
    pub fn iter(&self) -> impl Iterator<Item = &RetrievedMatch> {
        self.user.iter().chain(self.category.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(score: f32, source: MatchSource) -> RetrievedMatch {
        RetrievedMatch {
            id: format!("m-{}", score),
            score,
            source,
            metadata: VectorMetadata {
                doc_id: "d".into(),
                user_id: "u".into(),
                category: "loan".into(),
                chunk_id: 0,
                page_start: 1,
                page_end: 1,
                text: "text".into(),
                source: source.as_str().into(),
            },
        }
    }

    #[test]
    fn test_confidence_is_max_across_scopes() {
        let ctx = PromptContext {
            user: vec![scored(0.3, MatchSource::User)],
            category: vec![scored(0.9, MatchSource::Category)],
        };
        assert!((ctx.confidence() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_empty_is_zero() {
        let ctx = PromptContext::default();
        assert!(ctx.is_empty());
        assert_eq!(ctx.confidence(), 0.0);
    }

    #[test]
    fn test_category_only_context_is_not_empty() {
        let ctx = PromptContext {
            user: Vec::new(),
            category: vec![scored(0.4, MatchSource::Category)],
        };
        assert!(!ctx.is_empty());
        assert_eq!(ctx.category[0].text(), "text");
    }

    #[test]
    fn test_match_source_serializes_lowercase() {
        let json = serde_json::to_string(&MatchSource::Category).unwrap();
        assert_eq!(json, "\"category\"");
    }
}
