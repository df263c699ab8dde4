//! Typed errors for the core pipeline.
//!
//! Input and retrieval failures propagate. Embedding and generation
//! failures are recovered locally by the caller, which substitutes a
//! fallback and marks the result with [`Recovered::degraded`].

use thiserror::Error;

/// Bad or unusable caller input. Never retried.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no documents selected")]
    NoDocuments,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("{0} must not be empty")]
    MissingField(&'static str),

    #[error("unreadable document: {0}")]
    Unreadable(String),

    #[error("document contains no extractable text")]
    NoText,
}

/// Failures reported by a vector index implementation.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("malformed filter: unknown field `{0}`")]
    MalformedFilter(String),

    #[error("vector index error: {0}")]
    Backend(String),
}

/// Failure of a retrieval request as a whole.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("retrieval failed: {0}")]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding provider is disabled")]
    Disabled,

    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding response malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("answer generator is disabled")]
    Disabled,

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation response malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Umbrella error for pipeline entry points.
#[derive(Debug, Error)]
pub enum LensError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error("indexing failed: {0}")]
    Index(#[from] IndexError),

    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// A value that may have been substituted by a local fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered<T> {
    pub value: T,
    pub degraded: bool,
}

impl<T> Recovered<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            degraded: false,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            degraded: true,
        }
    }
}
