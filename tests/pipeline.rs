//! End-to-end pipeline tests over the in-memory index with stub providers.

mod common;

use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use legal_lens::ask::{answer_question, AskRequest};
use legal_lens::embedding::DisabledEmbedder;
use legal_lens::ingest::{delete_document, ingest_document, seed_category, UploadRequest};
use legal_lens_core::error::{IndexError, InputError, LensError, RetrievalError};
use legal_lens_core::generate::PLACEHOLDER_ANSWER;
use legal_lens_core::index::{Filter, VectorIndex};
use legal_lens_core::models::{VectorHit, VectorRecord};

use common::{harness, index_user_doc, minimal_pdf, RecordingGenerator};

/// Every call fails as if the index were unreachable.
struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<(), IndexError> {
        Err(IndexError::Unavailable("down".into()))
    }
    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _filter: &Filter,
    ) -> Result<Vec<VectorHit>, IndexError> {
        Err(IndexError::Unavailable("down".into()))
    }
    async fn delete_by_filter(&self, _field: &str, _value: &str) -> Result<usize, IndexError> {
        Err(IndexError::Unavailable("down".into()))
    }
}

fn ask(doc_ids: &[&str], question: &str) -> AskRequest {
    AskRequest {
        user_id: "alice".into(),
        doc_ids: doc_ids.iter().map(|d| d.to_string()).collect(),
        question: question.into(),
        category: "loan".into(),
    }
}

#[tokio::test]
async fn test_ingest_pdf_indexes_chunks_and_stores_original() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());

    let pdf = minimal_pdf(&[
        "The borrower shall repay the loan in twelve installments.",
        "Late fees apply after ten days.",
    ]);
    let report = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "alice".into(),
            category: "loan".into(),
            filename: "agreement.pdf".into(),
            bytes: pdf.clone(),
        },
    )
    .await
    .unwrap();

    assert!(report.chunks_count >= 1);
    assert!(!report.embeddings_degraded);
    assert_eq!(h.index.len(), report.chunks_count);

    let stored = tmp.path().join("alice").join(format!("{}.pdf", report.doc_id));
    assert_eq!(fs::read(stored).unwrap(), pdf);

    let hits = h
        .index
        .query(&[1.0; common::DIMS], 10, &Filter::eq("doc_id", report.doc_id.as_str()))
        .await
        .unwrap();
    assert_eq!(hits.len(), report.chunks_count);
    let first = hits.iter().find(|h| h.metadata.chunk_id == 0).unwrap();
    assert_eq!(first.id, format!("{}_chunk_0", report.doc_id));
    assert_eq!(first.metadata.page_start, 1);
    assert_eq!(first.metadata.source, "user");
    assert_eq!(first.metadata.user_id, "alice");
    assert!(first.metadata.text.contains("borrower"));
}

#[tokio::test]
async fn test_ingest_rejects_unreadable_pdf_and_discards_blob() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());

    let err = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "alice".into(),
            category: "loan".into(),
            filename: "broken.pdf".into(),
            bytes: b"this is not a pdf".to_vec(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LensError::Input(InputError::Unreadable(_))));
    assert!(h.index.is_empty());
    let leftovers = fs::read_dir(tmp.path().join("alice"))
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_ingest_discards_blob_when_index_rejects_records() {
    let tmp = TempDir::new().unwrap();
    let mut h = harness(tmp.path(), RecordingGenerator::default());
    h.services.index = Arc::new(DownIndex);

    let err = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "alice".into(),
            category: "loan".into(),
            filename: "agreement.pdf".into(),
            bytes: minimal_pdf(&["The borrower repays monthly."]),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LensError::Index(IndexError::Unavailable(_))));
    let leftovers = fs::read_dir(tmp.path().join("alice"))
        .map(|d| d.count())
        .unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn test_ingest_validates_fields() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());
    let pdf = minimal_pdf(&["Some text."]);

    let err = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "  ".into(),
            category: "loan".into(),
            filename: "a.pdf".into(),
            bytes: pdf.clone(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::MissingField("user_id"))));

    let err = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "alice".into(),
            category: "".into(),
            filename: "a.pdf".into(),
            bytes: pdf,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::MissingField("category"))));

    let err = ingest_document(
        &h.services,
        UploadRequest {
            user_id: "alice".into(),
            category: "loan".into(),
            filename: "a.pdf".into(),
            bytes: Vec::new(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::Unreadable(_))));
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_seed_category_indexes_txt_files_only() {
    let tmp = TempDir::new().unwrap();
    let seeds = tmp.path().join("seeds");
    fs::create_dir_all(&seeds).unwrap();
    fs::write(seeds.join("b_precedent.txt"), "Late payment penalties are capped.").unwrap();
    fs::write(seeds.join("a_precedent.txt"), "Collateral must be insured.").unwrap();
    fs::write(seeds.join("notes.md"), "not reference material").unwrap();
    fs::write(seeds.join("empty.txt"), "   \n\n").unwrap();

    let h = harness(&tmp.path().join("uploads"), RecordingGenerator::default());
    let report = seed_category(&h.services, "loan", &seeds).await.unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.chunks, 2);
    assert_eq!(report.degraded_files, 0);

    let hits = h
        .index
        .query(&common::embed_words("collateral"), 10, &Filter::eq("category", "loan"))
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.metadata.source == "category"));
    assert!(hits.iter().all(|h| h.metadata.user_id.is_empty()));
    assert!(hits.iter().any(|h| h.id == "a_precedent_chunk_0"));
    assert!(hits.iter().any(|h| h.metadata.doc_id == "b_precedent"));
}

#[tokio::test]
async fn test_seed_category_degrades_without_embedder() {
    let tmp = TempDir::new().unwrap();
    let seeds = tmp.path().join("seeds");
    fs::create_dir_all(&seeds).unwrap();
    fs::write(seeds.join("one.txt"), "Guarantor obligations survive.").unwrap();

    let mut h = harness(tmp.path(), RecordingGenerator::default());
    h.services.embedder = Arc::new(DisabledEmbedder::new(common::DIMS));

    let report = seed_category(&h.services, "loan", &seeds).await.unwrap();
    assert_eq!(report.files, 1);
    assert_eq!(report.degraded_files, 1);
    assert_eq!(h.index.len(), 1);
}

#[tokio::test]
async fn test_ask_answers_from_user_chunks_without_fallback() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());
    index_user_doc(
        h.index.as_ref(),
        "doc-a",
        "alice",
        "loan",
        &[
            "When is the first repayment due one",
            "When is the first repayment due two",
            "When is the first repayment due three",
            "When is the first repayment due four",
        ],
    )
    .await;

    let response = answer_question(&h.services, &ask(&["doc-a"], "When is the first repayment due"))
        .await
        .unwrap();

    assert!(!response.used_category);
    assert!(!response.answer_degraded);
    assert_eq!(response.answer, "**Answer:** see clause 4.");
    assert_eq!(response.sources.len(), 3);
    assert!(response.sources.iter().all(|s| s.source == "user"));
    assert!(response.sources.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    assert!((response.confidence - response.sources[0].similarity).abs() < 1e-6);

    let instruction = h.generator.last().unwrap();
    assert!(instruction.contains("USER QUESTION:\nWhen is the first repayment due"));
    assert!(instruction.contains("1) [DOC:doc-a | CHUNK:"));
    assert!(instruction.contains("3) [DOC:doc-a"));
    assert!(!instruction.contains("4) [DOC:"));
    assert!(instruction.contains(
        "CATEGORY CONTEXT (optional, supporting only if user chunks insufficient):\n(none)"
    ));
}

#[tokio::test]
async fn test_ask_falls_back_to_category_when_user_evidence_is_thin() {
    let tmp = TempDir::new().unwrap();
    let seeds = tmp.path().join("seeds");
    fs::create_dir_all(&seeds).unwrap();
    fs::write(
        seeds.join("penalties.txt"),
        "Late payment penalty terms are five percent per month.",
    )
    .unwrap();
    fs::write(
        seeds.join("grace.txt"),
        "Penalty terms for late payment begin after a grace period.",
    )
    .unwrap();

    let h = harness(&tmp.path().join("uploads"), RecordingGenerator::default());
    seed_category(&h.services, "loan", &seeds).await.unwrap();
    index_user_doc(
        h.index.as_ref(),
        "doc-a",
        "alice",
        "loan",
        &["The landlord provides parking.", "Utilities are shared equally."],
    )
    .await;

    let response = answer_question(
        &h.services,
        &ask(&["doc-a"], "What are the late payment penalty terms"),
    )
    .await
    .unwrap();

    assert!(response.used_category);
    let user: Vec<_> = response.sources.iter().filter(|s| s.source == "user").collect();
    let category: Vec<_> = response
        .sources
        .iter()
        .filter(|s| s.source == "category")
        .collect();
    assert_eq!(user.len(), 2);
    assert_eq!(category.len(), 2);
    assert_eq!(response.sources[0].source, "user");
    assert!(category.iter().any(|s| s.doc_id == "penalties"));
    assert!(category.iter().any(|s| s.doc_id == "grace"));

    let best = response
        .sources
        .iter()
        .map(|s| s.similarity)
        .fold(f32::MIN, f32::max);
    assert!((response.confidence - best).abs() < 1e-6);

    let instruction = h.generator.last().unwrap();
    assert!(instruction.contains("[CATEGORY:loan | SRC:"));
    assert!(instruction.contains("2) [CATEGORY:loan | SRC:"));
}

#[tokio::test]
async fn test_ask_is_scoped_to_selected_documents() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());
    index_user_doc(h.index.as_ref(), "doc-a", "alice", "loan", &["Interest accrues daily."]).await;
    index_user_doc(h.index.as_ref(), "doc-b", "alice", "lease", &["Interest accrues daily."]).await;

    let mut request = ask(&["doc-a"], "How does interest accrue");
    request.category = "none-seeded".into();
    let response = answer_question(&h.services, &request).await.unwrap();

    assert!(response.used_category);
    assert_eq!(response.sources.len(), 1);
    assert_eq!(response.sources[0].doc_id, "doc-a");
}

#[tokio::test]
async fn test_ask_validates_input() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());

    let err = answer_question(&h.services, &ask(&[], "question"))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::NoDocuments)));

    let err = answer_question(&h.services, &ask(&["  "], "question"))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::NoDocuments)));

    let err = answer_question(&h.services, &ask(&["doc-a"], "   "))
        .await
        .unwrap_err();
    assert!(matches!(err, LensError::Input(InputError::EmptyQuestion)));

    let mut request = ask(&["doc-a"], "question");
    request.category = String::new();
    let err = answer_question(&h.services, &request).await.unwrap_err();
    assert!(matches!(
        err,
        LensError::Input(InputError::MissingField("category"))
    ));
    assert!(h.generator.last().is_none());
}

#[tokio::test]
async fn test_ask_substitutes_placeholder_when_generation_fails() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::failing());
    index_user_doc(h.index.as_ref(), "doc-a", "alice", "loan", &["Interest accrues daily."]).await;

    let response = answer_question(&h.services, &ask(&["doc-a"], "How does interest accrue"))
        .await
        .unwrap();

    assert!(response.answer_degraded);
    assert_eq!(response.answer, PLACEHOLDER_ANSWER);
    assert_eq!(response.sources[0].doc_id, "doc-a");
}

#[tokio::test]
async fn test_ask_on_unknown_document_has_empty_context() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());

    let response = answer_question(&h.services, &ask(&["missing"], "Anything"))
        .await
        .unwrap();

    assert!(response.used_category);
    assert!(response.sources.is_empty());
    assert_eq!(response.confidence, 0.0);
    let instruction = h.generator.last().unwrap();
    assert!(instruction.contains("(highest relevance first):\n(none)"));
}

#[tokio::test]
async fn test_delete_removes_vectors_and_original() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());
    index_user_doc(
        h.index.as_ref(),
        "doc-a",
        "alice",
        "loan",
        &["one", "two", "three"],
    )
    .await;
    index_user_doc(h.index.as_ref(), "doc-b", "alice", "loan", &["other"]).await;
    fs::create_dir_all(tmp.path().join("alice")).unwrap();
    fs::write(tmp.path().join("alice/doc-a.pdf"), b"%PDF").unwrap();

    let removed = delete_document(&h.services, "doc-a", Some("alice")).await.unwrap();
    assert_eq!(removed, 3);
    assert_eq!(h.index.len(), 1);
    assert!(!tmp.path().join("alice/doc-a.pdf").exists());

    let again = delete_document(&h.services, "doc-a", Some("alice")).await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn test_delete_of_unindexed_document_keeps_stored_file() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), RecordingGenerator::default());
    fs::create_dir_all(tmp.path().join("alice")).unwrap();
    fs::write(tmp.path().join("alice/doc-x.pdf"), b"%PDF").unwrap();

    let removed = delete_document(&h.services, "doc-x", Some("alice")).await.unwrap();
    assert_eq!(removed, 0);
    assert!(tmp.path().join("alice/doc-x.pdf").exists());
}

#[tokio::test]
async fn test_retrieval_failure_propagates() {
    let tmp = TempDir::new().unwrap();
    let mut h = harness(tmp.path(), RecordingGenerator::default());
    h.services.index = Arc::new(DownIndex);

    let err = answer_question(&h.services, &ask(&["doc-a"], "question"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LensError::Retrieval(RetrievalError::Index(IndexError::Unavailable(_)))
    ));
    assert!(h.generator.last().is_none());

    let err = delete_document(&h.services, "doc-a", None).await.unwrap_err();
    assert!(matches!(err, LensError::Index(IndexError::Unavailable(_))));
}
