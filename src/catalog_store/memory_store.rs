//! In-memory catalog store.
//!
//! The snapshot is still kept as serialized JSON so that whatever the engine
//! relies on survives a real serialization round trip.

use super::trait_def::CatalogStore;
use crate::catalog::Record;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryCatalogStore {
    snapshot: RwLock<Option<String>>,
    saves: AtomicUsize,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `records`, as if saved by a previous run.
    pub fn with_records(records: &[Record]) -> Result<Self> {
        Ok(Self {
            snapshot: RwLock::new(Some(serde_json::to_string(records)?)),
            saves: AtomicUsize::new(0),
        })
    }

    /// The raw JSON of the last save, if any.
    pub async fn snapshot_json(&self) -> Option<String> {
        self.snapshot.read().await.clone()
    }

    /// How many times `save` succeeded.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn load(&self) -> Result<Vec<Record>> {
        match self.snapshot.read().await.as_deref() {
            Some(json) => Ok(serde_json::from_str(json)?),
            None => Ok(vec![]),
        }
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        let json = serde_json::to_string(records)?;
        *self.snapshot.write().await = Some(json);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let store = InMemoryCatalogStore::new();
        assert!(store.load().await.unwrap().is_empty());

        let records = vec![Record::new("1", "A-B", None), Record::new("2", "C", None)];
        store.save(&records).await.unwrap();

        assert_eq!(store.load().await.unwrap(), records);
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot_json().await.unwrap().starts_with('['));
    }
}
