//! # Legal Lens
//!
//! Retrieval-grounded question answering over legal PDFs.
//!
//! A user uploads a document; it is split into page-aware chunks, embedded,
//! and indexed. Questions are answered from the user's own chunks first,
//! falling back to shared category reference material when those are
//! sparse or weakly relevant.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//! │ PDF/text │──▶│ Chunk+Embed  │──▶│ VectorIndex │
//! └──────────┘   └──────────────┘   └──────┬──────┘
//!                                          │
//!            question ──▶ Retrieve ◀───────┘
//!                            │
//!                            ▼
//!                   Assemble ──▶ Generate
//!                            │
//!                ┌───────────┴───────────┐
//!                ▼                       ▼
//!           ┌──────────┐           ┌──────────┐
//!           │   CLI    │           │   HTTP   │
//!           │  (lens)  │           │  (axum)  │
//!           └──────────┘           └──────────┘
//! ```
//!
//! The pure pieces (chunker, retriever, context assembler, collaborator
//! traits) live in `legal_lens_core`. This crate supplies the concrete
//! collaborators and the pipelines around them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF page extraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Index schema |
//! | [`index_sqlite`] | SQLite vector index |
//! | [`embedding`] | Embedding providers |
//! | [`generate`] | Answer generators |
//! | [`http`] | Shared JSON POST with retry |
//! | [`storage`] | Local blob storage |
//! | [`services`] | Collaborator wiring |
//! | [`ingest`] | Upload, seed, and delete pipelines |
//! | [`ask`] | Question answering pipeline |
//! | [`server`] | HTTP API |

pub mod ask;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod http;
pub mod index_sqlite;
pub mod ingest;
pub mod migrate;
pub mod server;
pub mod services;
pub mod storage;
