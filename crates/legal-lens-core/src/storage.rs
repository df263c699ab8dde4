//! Blob storage seam for original uploads.
//!
//! Blobs are addressed by `(user_id, doc_id)`. Both parts must be single
//! safe path segments so any backend can map them onto a directory layout
//! or object key without escaping its root.

use async_trait::async_trait;

use crate::error::StorageError;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return the location it was written to.
    async fn put(
        &self,
        user_id: &str,
        doc_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError>;

    /// Remove the blob. Removing a missing blob succeeds.
    async fn delete(&self, user_id: &str, doc_id: &str) -> Result<(), StorageError>;
}

/// Check that `segment` can be used as one path component.
pub fn validate_segment(segment: &str) -> Result<(), StorageError> {
    let bad = segment.trim().is_empty()
        || segment == "."
        || segment == ".."
        || segment.contains(['/', '\\', '\0'])
        || segment.contains("..");
    if bad {
        return Err(StorageError::InvalidKey(segment.to_string()));
    }
    Ok(())
}

/// `{user_id}/{doc_id}.pdf`, after validating both segments.
pub fn blob_key(user_id: &str, doc_id: &str) -> Result<String, StorageError> {
    validate_segment(user_id)?;
    validate_segment(doc_id)?;
    Ok(format!("{}/{}.pdf", user_id, doc_id))
}
