//! Filesystem [`BlobStore`] for original uploads.
//!
//! Layout under the configured root: `{user_id}/{doc_id}.pdf`.

use async_trait::async_trait;
use std::path::PathBuf;

use legal_lens_core::error::StorageError;
use legal_lens_core::storage::{blob_key, BlobStore};

pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, user_id: &str, doc_id: &str) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(blob_key(user_id, doc_id)?))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        user_id: &str,
        doc_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let path = self.path_for(user_id, doc_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!(
            path = %path.display(),
            filename,
            bytes = bytes.len(),
            "stored upload"
        );
        Ok(path.display().to_string())
    }

    async fn delete(&self, user_id: &str, doc_id: &str) -> Result<(), StorageError> {
        let path = self.path_for(user_id, doc_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
