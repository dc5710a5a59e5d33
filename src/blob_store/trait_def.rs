//! BlobStore trait definition.

use anyhow::Result;
use async_trait::async_trait;

/// Storage backend for document bytes.
///
/// Every operation is independent and atomic on its own; there is no way to
/// group several of them, and no coordination with the catalog snapshot.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `id`, replacing whatever was there.
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()>;

    /// Fetch the bytes stored under `id`, if any.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Remove the entry under `id`. Removing a missing id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// List every stored id, oldest first.
    async fn list_ids(&self) -> Result<Vec<String>>;

    /// Number of stored entries.
    async fn count(&self) -> Result<usize>;
}
