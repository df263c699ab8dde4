//! In-memory [`VectorIndex`] for tests and single-process deployments.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every record that passes the filter.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::embedding::cosine_similarity;
use crate::error::IndexError;
use crate::models::{VectorHit, VectorMetadata, VectorRecord};

use super::{Filter, VectorIndex};

pub struct InMemoryIndex {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<VectorRecord>>, IndexError> {
        self.records
            .read()
            .map_err(|_| IndexError::Unavailable("in-memory index lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<VectorRecord>>, IndexError> {
        self.records
            .write()
            .map_err(|_| IndexError::Unavailable("in-memory index lock poisoned".into()))
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata_value(meta: &VectorMetadata) -> Result<Value, IndexError> {
    serde_json::to_value(meta).map_err(|e| IndexError::Backend(e.to_string()))
}

fn matches(meta: &Value, filter: &Filter) -> bool {
    filter
        .clauses()
        .iter()
        .all(|(field, expected)| meta.get(field) == Some(expected))
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), IndexError> {
        let mut stored = self.write()?;
        for rec in records {
            match stored.iter_mut().find(|r| r.id == rec.id) {
                Some(existing) => *existing = rec.clone(),
                None => stored.push(rec.clone()),
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &Filter,
    ) -> Result<Vec<VectorHit>, IndexError> {
        filter.validate()?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let stored = self.read()?;
        let mut hits = Vec::new();
        for rec in stored.iter() {
            if !filter.is_empty() && !matches(&metadata_value(&rec.metadata)?, filter) {
                continue;
            }
            hits.push(VectorHit {
                id: rec.id.clone(),
                score: cosine_similarity(vector, &rec.vector),
                metadata: rec.metadata.clone(),
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
        let filter = Filter::eq(field, value);
        filter.validate()?;

        let mut stored = self.write()?;
        // Decide every record before touching the store.
        let doomed = stored
            .iter()
            .map(|rec| Ok(matches(&metadata_value(&rec.metadata)?, &filter)))
            .collect::<Result<Vec<bool>, IndexError>>()?;

        let mut flags = doomed.iter();
        stored.retain(|_| !flags.next().copied().unwrap_or(false));
        Ok(doomed.iter().filter(|d| **d).count())
    }
}
