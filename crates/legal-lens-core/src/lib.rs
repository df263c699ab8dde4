//! # Legal Lens Core
//!
//! Pure logic for Legal Lens: the page-aware chunker, the retrieval policy
//! with category fallback, and the prompt-context assembler, together with
//! the traits the application implements for its external collaborators
//! (vector index, embedding provider, answer generator, blob storage).
//!
//! This crate performs no I/O of its own. It has no tokio, sqlx, HTTP, or
//! filesystem dependencies; every side effect goes through a trait object
//! handed in by the caller.
//!
//! ```text
//! pages ──▶ chunk ──▶ (embed + upsert)
//!                                   question ──▶ (embed) ──▶ retrieve ──▶ context ──▶ (generate)
//! ```

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod index;
pub mod models;
pub mod retrieve;
pub mod storage;
pub mod tokens;
