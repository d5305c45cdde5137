use async_trait::async_trait;

use super::error::StorageError;
use super::key::BlobKey;

/// Durable storage for original upload files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing anything already there.
    async fn put(&self, key: &BlobKey, data: &[u8]) -> Result<(), StorageError>;

    /// Retrieve all bytes stored under `key`.
    async fn get(&self, key: &BlobKey) -> Result<Vec<u8>, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key: &BlobKey) -> Result<bool, StorageError>;

    /// Delete the blob under `key`.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, key: &BlobKey) -> Result<bool, StorageError>;
}
