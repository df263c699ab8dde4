//! Question answering over a user's documents.
//!
//! embed question → retrieve (user scope, category fallback) → assemble
//! instruction → generate. Retrieval failures propagate; embedding and
//! generation failures degrade and are flagged on the response.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use legal_lens_core::context::assemble;
use legal_lens_core::error::{InputError, LensError};
use legal_lens_core::models::RetrievedMatch;
use legal_lens_core::retrieve::Retriever;

use crate::embedding::embed_query;
use crate::generate::generate_or_placeholder;
use crate::services::Services;

const SNIPPET_CHARS: usize = 240;

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub doc_ids: Vec<String>,
    pub question: String,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SourceItem {
    pub doc_id: String,
    pub chunk_id: usize,
    pub page_range: String,
    pub similarity: f32,
    pub source: String,
    pub text_snippet: String,
}

impl SourceItem {
    fn from_match(m: &RetrievedMatch) -> Self {
        let md = &m.metadata;
        Self {
            doc_id: md.doc_id.clone(),
            chunk_id: md.chunk_id,
            page_range: format!("{}-{}", md.page_start, md.page_end),
            similarity: m.score,
            source: m.source.as_str().to_string(),
            text_snippet: m.text().chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    /// Matches shown to the generator, in prompt order.
    pub sources: Vec<SourceItem>,
    pub confidence: f32,
    pub used_category: bool,
    /// `answer` is the placeholder, not generated text.
    pub answer_degraded: bool,
}

pub async fn answer_question(
    services: &Services,
    request: &AskRequest,
) -> Result<AskResponse, LensError> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(InputError::EmptyQuestion.into());
    }
    if request.category.trim().is_empty() {
        return Err(InputError::MissingField("category").into());
    }
    let allowed: BTreeSet<String> = request
        .doc_ids
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();
    if allowed.is_empty() {
        return Err(InputError::NoDocuments.into());
    }

    let query = embed_query(services.embedder.as_ref(), question).await;

    let retriever = Retriever::new(services.index.as_ref(), services.retrieval_policy.clone());
    let retrieval = retriever
        .retrieve(&query.value, &allowed, &request.category)
        .await?;
    let context = retrieval.context();
    if context.is_empty() {
        tracing::warn!(docs = allowed.len(), "no evidence selected for question");
    }

    let instruction = assemble(question, &context, &request.category);
    let answer = generate_or_placeholder(services.generator.as_ref(), &instruction).await;

    tracing::info!(
        user_id = %request.user_id,
        docs = allowed.len(),
        user_matches = retrieval.user_top.len(),
        category_matches = retrieval.category_results.len(),
        used_category = retrieval.used_category,
        query_degraded = query.degraded,
        answer_degraded = answer.degraded,
        "question answered"
    );

    Ok(AskResponse {
        answer: answer.value,
        sources: context.iter().map(SourceItem::from_match).collect(),
        confidence: context.confidence(),
        used_category: retrieval.used_category,
        answer_degraded: answer.degraded,
    })
}
