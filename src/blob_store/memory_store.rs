//! In-memory blob store, for tests and throwaway catalogs.

use super::trait_def::BlobStore;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryBlobStore {
    // Insertion order is kept so `list_ids` matches the SQLite store.
    entries: RwLock<Vec<(String, Vec<u8>)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.retain(|(existing, _)| existing != id);
        entries.push((id.to_owned(), bytes.to_vec()));
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, bytes)| bytes.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .retain(|(existing, _)| existing != id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        Ok(entries.iter().map(|(id, _)| id.clone()).collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.len().await)
    }
}
