//! Two-scope retrieval with category fallback.
//!
//! A question is answered primarily from the user's own documents. Every
//! selected document is searched independently, the per-document result
//! lists are merged and globally re-ranked by score, and only when that
//! evidence is thin (too few matches, or a weak best match) is the shared
//! category reference corpus consulted.
//!
//! ```text
//!   allowed_doc_ids ──▶ query(doc_id = d, top 5) ─┐   (concurrently)
//!                        …                         ├─▶ merge ─▶ sort ─▶ dedupe ─▶ top 5
//!                        query(doc_id = z, top 5) ─┘
//!
//!   needs fallback? ──▶ query(category = c, top 3)
//!
//!   context = user_top[..3] + category[..2]
//! ```
//!
//! Per-document completion order is never relied on; the explicit sort
//! re-establishes ordering.

use std::collections::{BTreeSet, HashSet};

use futures::future::try_join_all;

use crate::error::{InputError, RetrievalError};
use crate::index::{Filter, VectorIndex, FIELD_CATEGORY, FIELD_DOC_ID};
use crate::models::{MatchSource, PromptContext, RetrievedMatch, VectorHit};

/// Top-k sizes and the fallback trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalPolicy {
    /// Per-document search depth, and the size of the merged user list.
    pub user_top_k: usize,
    pub category_top_k: usize,
    /// Fewer user matches than this triggers category fallback.
    pub min_user_matches: usize,
    /// A best user score below this triggers category fallback.
    pub similarity_threshold: f32,
    /// User matches carried into the prompt context.
    pub user_context: usize,
    /// Category matches carried into the prompt context.
    pub category_context: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            user_top_k: 5,
            category_top_k: 3,
            min_user_matches: 3,
            similarity_threshold: 0.55,
            user_context: 3,
            category_context: 2,
        }
    }
}

/// Result of one retrieval request.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    /// Best user matches across all allowed documents, score descending.
    pub user_top: Vec<RetrievedMatch>,
    /// Category matches in index order; empty unless fallback ran.
    pub category_results: Vec<RetrievedMatch>,
    /// Whether the category fallback query was issued.
    pub used_category: bool,
    user_context: usize,
    category_context: usize,
}

impl Retrieval {
    /// The matches carried into the prompt.
    pub fn context(&self) -> PromptContext {
        select_context(
            &self.user_top,
            &self.category_results,
            self.user_context,
            self.category_context,
        )
    }
}

pub struct Retriever<'a> {
    index: &'a dyn VectorIndex,
    policy: RetrievalPolicy,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a dyn VectorIndex, policy: RetrievalPolicy) -> Self {
        Self { index, policy }
    }

    /// Retrieve user matches from `allowed_doc_ids` and, when needed,
    /// category matches for `category`.
    ///
    /// # Errors
    ///
    /// - [`InputError::NoDocuments`] when `allowed_doc_ids` is empty.
    /// - Any index failure, as [`RetrievalError::Index`]. Partial results
    ///   are never returned.
    pub async fn retrieve(
        &self,
        query_vec: &[f32],
        allowed_doc_ids: &BTreeSet<String>,
        category: &str,
    ) -> Result<Retrieval, RetrievalError> {
        if allowed_doc_ids.is_empty() {
            return Err(InputError::NoDocuments.into());
        }

        let per_doc = allowed_doc_ids.iter().map(|doc_id| {
            let filter = Filter::eq(FIELD_DOC_ID, doc_id.as_str());
            async move {
                self.index
                    .query(query_vec, self.policy.user_top_k, &filter)
                    .await
            }
        });
        let lists = try_join_all(per_doc).await?;

        let user_top = rank_user_matches(lists.into_iter().flatten(), self.policy.user_top_k);

        let used_category = needs_category_fallback(
            &user_top,
            self.policy.min_user_matches,
            self.policy.similarity_threshold,
        );

        let category_results = if used_category {
            let hits = self
                .index
                .query(
                    query_vec,
                    self.policy.category_top_k,
                    &Filter::eq(FIELD_CATEGORY, category),
                )
                .await?;
            collect_category_matches(hits, self.policy.category_top_k)
        } else {
            Vec::new()
        };

        Ok(Retrieval {
            user_top,
            category_results,
            used_category,
            user_context: self.policy.user_context,
            category_context: self.policy.category_context,
        })
    }
}

/// Merge per-document hits into the global user ranking.
///
/// Blank-text hits are dropped before counting. The rest are sorted by
/// score descending (stable, so equal scores keep arrival order),
/// duplicate ids collapse onto their best-scored occurrence, and the list
/// is cut to `top_k`.
pub fn rank_user_matches<I>(hits: I, top_k: usize) -> Vec<RetrievedMatch>
where
    I: IntoIterator<Item = VectorHit>,
{
    let mut matches: Vec<RetrievedMatch> = hits
        .into_iter()
        .map(|h| RetrievedMatch::from_hit(h, MatchSource::User))
        .filter(|m| !m.is_blank())
        .collect();

    matches.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut seen = HashSet::new();
    matches.retain(|m| seen.insert(m.id.clone()));
    matches.truncate(top_k);
    matches
}

/// `true` when the user evidence is too thin to answer alone: fewer than
/// `min_matches` matches, or a best score below `threshold`.
///
/// An empty list always needs fallback through the count condition.
pub fn needs_category_fallback(
    user_top: &[RetrievedMatch],
    min_matches: usize,
    threshold: f32,
) -> bool {
    if user_top.len() < min_matches {
        return true;
    }
    user_top
        .iter()
        .map(|m| m.score)
        .reduce(f32::max)
        .map(|best| best < threshold)
        .unwrap_or(false)
}

/// Category hits in index order, blanks dropped, cut to `top_k`.
fn collect_category_matches(hits: Vec<VectorHit>, top_k: usize) -> Vec<RetrievedMatch> {
    let mut matches: Vec<RetrievedMatch> = hits
        .into_iter()
        .map(|h| RetrievedMatch::from_hit(h, MatchSource::Category))
        .filter(|m| !m.is_blank())
        .collect();
    matches.truncate(top_k);
    matches
}

/// Take the first `user_n` user matches and the first `category_n`
/// category matches, in their existing order.
pub fn select_context(
    user_top: &[RetrievedMatch],
    category_results: &[RetrievedMatch],
    user_n: usize,
    category_n: usize,
) -> PromptContext {
    PromptContext {
        user: user_top.iter().take(user_n).cloned().collect(),
        category: category_results.iter().take(category_n).cloned().collect(),
    }
}
