//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is everything the pipeline needs from a
//! similarity store: bulk upsert, filtered top-k query, and filtered
//! delete. Filters are exact-match conjunctions over [`VectorMetadata`]
//! field names; there are no ranges and no OR.
//!
//! Implementations must be `Send + Sync` so one index can serve concurrent
//! requests behind an `Arc`.
//!
//! [`VectorMetadata`]: crate::models::VectorMetadata

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::IndexError;
use crate::models::{VectorHit, VectorRecord};

pub use memory::InMemoryIndex;

pub const FIELD_DOC_ID: &str = "doc_id";
pub const FIELD_CATEGORY: &str = "category";

/// Every metadata field a filter may name.
pub const FILTER_FIELDS: &[&str] = &[
    FIELD_DOC_ID,
    "user_id",
    FIELD_CATEGORY,
    "chunk_id",
    "page_start",
    "page_end",
    "text",
    "source",
];

/// Exact-match conjunction over metadata fields.
///
/// ```rust
/// use legal_lens_core::index::Filter;
///
/// let f = Filter::eq("doc_id", "abc").and("source", "user");
/// assert_eq!(f.clauses().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// A filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((field.into(), value.into()));
        self
    }

    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Fail with [`IndexError::MalformedFilter`] on the first field that is
    /// not a metadata field.
    pub fn validate(&self) -> Result<(), IndexError> {
        for (field, _) in &self.clauses {
            if !FILTER_FIELDS.contains(&field.as_str()) {
                return Err(IndexError::MalformedFilter(field.clone()));
            }
        }
        Ok(())
    }
}

/// Abstract similarity store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Insert or replace records by id |
/// | [`query`](VectorIndex::query) | Top-k by similarity within a filter, best first |
/// | [`delete_by_filter`](VectorIndex::delete_by_filter) | Remove every record with `field == value` |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), IndexError>;

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<VectorHit>, IndexError>;

    /// Returns the number of records removed.
    async fn delete_by_filter(&self, field: &str, value: &str) -> Result<usize, IndexError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder_keeps_order() {
        let f = Filter::eq("doc_id", "d1").and("chunk_id", 3);
        assert_eq!(f.clauses()[0], ("doc_id".to_string(), Value::from("d1")));
        assert_eq!(f.clauses()[1], ("chunk_id".to_string(), Value::from(3)));
        assert!(f.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_is_malformed() {
        let err = Filter::eq("owner", "x").validate().unwrap_err();
        assert!(matches!(err, IndexError::MalformedFilter(f) if f == "owner"));
    }

    #[test]
    fn test_empty_filter() {
        assert!(Filter::all().is_empty());
        assert!(Filter::all().validate().is_ok());
    }
}
