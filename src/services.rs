//! The collaborators a pipeline runs against.
//!
//! [`Services`] bundles the vector index, embedder, answer generator, and
//! blob store behind trait objects, together with the chunking and
//! retrieval policies. The CLI builds one per command; the HTTP server
//! builds one at startup and shares it across handlers.

use anyhow::{bail, Context, Result};
use std::sync::Arc;

use legal_lens_core::chunk::ChunkPolicy;
use legal_lens_core::embedding::Embedder;
use legal_lens_core::generate::AnswerGenerator;
use legal_lens_core::index::{InMemoryIndex, VectorIndex};
use legal_lens_core::retrieve::RetrievalPolicy;
use legal_lens_core::storage::BlobStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generate::create_generator;
use crate::index_sqlite::SqliteIndex;
use crate::storage::LocalBlobStore;

#[derive(Clone)]
pub struct Services {
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub blobs: Arc<dyn BlobStore>,
    pub chunk_policy: ChunkPolicy,
    pub retrieval_policy: RetrievalPolicy,
}

impl Services {
    /// Build every collaborator named by `config`.
    ///
    /// The `sqlite` backend opens (and if needed creates) the index file;
    /// `memory` starts empty and lives only as long as the process.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let index: Arc<dyn VectorIndex> = match config.index.backend.as_str() {
            "sqlite" => Arc::new(SqliteIndex::open(&config.index.path).await.with_context(|| {
                format!("Failed to open index: {}", config.index.path.display())
            })?),
            "memory" => Arc::new(InMemoryIndex::new()),
            other => bail!("Unknown index backend: {}", other),
        };

        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        let generator: Arc<dyn AnswerGenerator> = Arc::from(create_generator(&config.generation)?);

        tracing::debug!(
            backend = %config.index.backend,
            embedder = embedder.model_name(),
            generator = generator.model_name(),
            "services ready"
        );

        Ok(Self {
            index,
            embedder,
            generator,
            blobs: Arc::new(LocalBlobStore::new(config.storage.root.clone())),
            chunk_policy: config.chunking.policy(),
            retrieval_policy: config.retrieval.policy(),
        })
    }

    /// Assemble services from explicit collaborators with default policies.
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn AnswerGenerator>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            blobs,
            chunk_policy: ChunkPolicy::default(),
            retrieval_policy: RetrievalPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_from_config_memory_backend() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.index.backend = "memory".into();
        config.storage.root = tmp.path().join("uploads");

        let services = Services::from_config(&config).await.unwrap();
        assert_eq!(services.embedder.model_name(), "disabled");
        assert_eq!(services.generator.model_name(), "disabled");
        assert_eq!(services.chunk_policy, ChunkPolicy::default());
    }

    #[tokio::test]
    async fn test_from_config_sqlite_creates_file() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.index.path = tmp.path().join("data").join("lens.sqlite");
        config.storage.root = tmp.path().join("uploads");

        Services::from_config(&config).await.unwrap();
        assert!(config.index.path.exists());
    }

    #[tokio::test]
    async fn test_from_config_unknown_backend() {
        let mut config = Config::default();
        config.index.backend = "pinecone".into();
        assert!(Services::from_config(&config).await.is_err());
    }
}
