//! The catalog engine: owner of the canonical record sequence.
//!
//! Every mutation goes through one async mutex, so concurrent callers (for
//! instance several ingestions finishing at once) are applied one at a time,
//! each together with its snapshot save and change notification.
//!
//! Consistency rules when a store write fails:
//! - add, rename, toggle_favorite and reorder work on a copy of the sequence
//!   that only replaces the in-memory one after the snapshot was saved, so a
//!   failed save leaves memory equal to what the catalog store holds.
//! - delete drops the record from memory and asks the blob store to remove
//!   the document whatever the outcome of the save.

use super::record::{parse_tags, Record};
use super::view::{Facets, ViewQuery};
use crate::blob_store::BlobStore;
use crate::catalog_store::CatalogStore;
use crate::error::{CatalogError, StoreKind};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

struct CatalogState {
    records: Vec<Record>,
    facets: Facets,
    /// Ids handed out to ingestions whose record was not added yet. Their
    /// blobs may already exist and must not be taken for orphans.
    pending: HashSet<String>,
}

/// Everything a list screen needs, taken at one point in time.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogView {
    pub items: Vec<Record>,
    pub facets: Facets,
    /// Number of records in the catalog, regardless of filters.
    pub total: usize,
    pub revision: u64,
}

/// Background removal of a deleted record's document.
pub struct BlobRemoval {
    id: String,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl BlobRemoval {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the removal to finish. Dropping the handle instead lets it run
    /// unobserved; failures are logged either way.
    pub async fn wait(self) -> Result<(), CatalogError> {
        match self.handle.await {
            Ok(result) => result.map_err(|source| CatalogError::BlobWrite {
                id: self.id,
                source,
            }),
            Err(join_error) => Err(CatalogError::BlobWrite {
                id: self.id,
                source: anyhow::Error::new(join_error),
            }),
        }
    }
}

pub struct CatalogEngine {
    state: Mutex<CatalogState>,
    catalog_store: Arc<dyn CatalogStore>,
    blob_store: Arc<dyn BlobStore>,
    revision: watch::Sender<u64>,
}

impl CatalogEngine {
    /// Load the last snapshot from `catalog_store` and build an engine on it.
    ///
    /// Failing to read the snapshot is fatal: it means the catalog store is
    /// unusable, and no mutation may be accepted.
    pub async fn load(
        catalog_store: Arc<dyn CatalogStore>,
        blob_store: Arc<dyn BlobStore>,
    ) -> Result<Self, CatalogError> {
        let loaded = catalog_store
            .load()
            .await
            .map_err(|e| CatalogError::store_unavailable(StoreKind::Catalog, e))?;

        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(loaded.len());
        for record in loaded {
            if seen.insert(record.id.clone()) {
                records.push(record);
            } else {
                warn!("Dropping duplicate record {} from snapshot", record.id);
            }
        }
        info!("Catalog loaded with {} records", records.len());

        let (revision, _) = watch::channel(0);
        Ok(Self {
            state: Mutex::new(CatalogState {
                facets: Facets::derive(&records),
                records,
                pending: HashSet::new(),
            }),
            catalog_store,
            blob_store,
            revision,
        })
    }

    pub(crate) fn blob_store(&self) -> Arc<dyn BlobStore> {
        self.blob_store.clone()
    }

    /// Receives the revision number after every committed mutation. This is
    /// the signal for a presentation layer to re-render.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Save `records` as the new snapshot and, only if that worked, make it
    /// the in-memory state, refresh the facets and notify subscribers.
    async fn commit(
        &self,
        state: &mut CatalogState,
        records: Vec<Record>,
        action: &str,
    ) -> Result<(), CatalogError> {
        if let Err(e) = self.catalog_store.save(&records).await {
            error!("Failed to persist catalog after {}: {:#}", action, e);
            return Err(CatalogError::CatalogWrite(e));
        }
        state.facets = Facets::derive(&records);
        state.records = records;
        self.revision.send_modify(|r| *r += 1);
        debug!("Committed {} ({} records)", action, state.records.len());
        Ok(())
    }

    fn position(state: &CatalogState, id: &str) -> Result<usize, CatalogError> {
        state
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CatalogError::NotFound(id.to_owned()))
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Append `record` at the end of the canonical sequence.
    pub async fn add(&self, record: Record) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        if state.records.iter().any(|r| r.id == record.id) {
            return Err(CatalogError::DuplicateId(record.id));
        }
        let id = record.id.clone();
        let mut records = state.records.clone();
        records.push(record);
        self.commit(&mut state, records, "add").await?;
        state.pending.remove(&id);
        Ok(())
    }

    /// Apply an edit form.
    ///
    /// A blank `new_name` keeps the current name and artist; collection and
    /// tags are applied regardless. The snapshot is saved in both cases.
    pub async fn rename(
        &self,
        id: &str,
        new_name: &str,
        new_collection: &str,
        new_tags_text: &str,
    ) -> Result<Record, CatalogError> {
        let mut state = self.state.lock().await;
        let index = Self::position(&state, id)?;
        let mut records = state.records.clone();
        let record = &mut records[index];

        let new_name = new_name.trim();
        if !new_name.is_empty() {
            record.set_name(new_name);
        }
        record.collection = new_collection.trim().to_owned();
        record.tags = parse_tags(new_tags_text);
        let updated = record.clone();

        self.commit(&mut state, records, "rename").await?;
        Ok(updated)
    }

    /// Flip the favorite flag, returning the new value.
    pub async fn toggle_favorite(&self, id: &str) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;
        let index = Self::position(&state, id)?;
        let mut records = state.records.clone();
        records[index].favorite = !records[index].favorite;
        let favorite = records[index].favorite;
        self.commit(&mut state, records, "toggle_favorite").await?;
        Ok(favorite)
    }

    /// Remove the record and schedule removal of its document.
    ///
    /// The document removal starts even when saving the snapshot fails; in
    /// that case the error is returned and the removal runs detached.
    pub async fn delete(&self, id: &str) -> Result<BlobRemoval, CatalogError> {
        let mut state = self.state.lock().await;
        let index = Self::position(&state, id)?;
        let mut records = state.records.clone();
        let removed = records.remove(index);

        let saved = self.catalog_store.save(&records).await;
        state.facets = Facets::derive(&records);
        state.records = records;
        self.revision.send_modify(|r| *r += 1);

        let removal = self.spawn_blob_removal(removed.id);
        match saved {
            Ok(()) => {
                debug!("Committed delete of {}", id);
                Ok(removal)
            }
            Err(e) => {
                error!("Deleted {} in memory but failed to persist: {:#}", id, e);
                Err(CatalogError::CatalogWrite(e))
            }
        }
    }

    fn spawn_blob_removal(&self, id: String) -> BlobRemoval {
        let blob_store = self.blob_store.clone();
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let result = blob_store.delete(&task_id).await;
            if let Err(e) = &result {
                warn!("Failed to remove blob {}: {:#}", task_id, e);
            }
            result
        });
        BlobRemoval { id, handle }
    }

    /// Move the record at `from_index` to `to_index`.
    ///
    /// The record is taken out first, so `to_index` counts positions in the
    /// sequence without it: `[A, B, C, D]` with `(0, 2)` gives `[B, C, A, D]`.
    pub async fn reorder(&self, from_index: usize, to_index: usize) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        self.reorder_locked(&mut state, from_index, to_index).await
    }

    /// Drag-and-drop: move `dragged_id` to where `target_id` currently is.
    /// Both ids are resolved against the canonical sequence, whatever order
    /// the caller displayed them in.
    pub async fn reorder_by_id(&self, dragged_id: &str, target_id: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock().await;
        let from_index = Self::position(&state, dragged_id)?;
        let to_index = Self::position(&state, target_id)?;
        self.reorder_locked(&mut state, from_index, to_index).await
    }

    async fn reorder_locked(
        &self,
        state: &mut CatalogState,
        from_index: usize,
        to_index: usize,
    ) -> Result<(), CatalogError> {
        let len = state.records.len();
        for index in [from_index, to_index] {
            if index >= len {
                return Err(CatalogError::IndexOutOfRange { index, len });
            }
        }
        if from_index == to_index {
            return Ok(());
        }
        let mut records = state.records.clone();
        let moved = records.remove(from_index);
        records.insert(to_index, moved);
        self.commit(state, records, "reorder").await
    }

    // =========================================================================
    // Ingestion support
    // =========================================================================

    /// Claim `id` for a record about to be ingested. Returns false if a record
    /// or another ingestion already uses it.
    pub(crate) async fn reserve_id(&self, id: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.records.iter().any(|r| r.id == id) {
            return false;
        }
        state.pending.insert(id.to_owned())
    }

    /// Give up a reservation made by [`reserve_id`](Self::reserve_id).
    pub(crate) async fn release_id(&self, id: &str) {
        self.state.lock().await.pending.remove(id);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Filtered, name-sorted projection. Never changes the canonical order.
    pub async fn view(&self, query: &ViewQuery) -> Vec<Record> {
        let state = self.state.lock().await;
        query.apply(&state.records)
    }

    /// Items, facets and counters taken under one lock.
    pub async fn render(&self, query: &ViewQuery) -> CatalogView {
        let state = self.state.lock().await;
        CatalogView {
            items: query.apply(&state.records),
            facets: state.facets.clone(),
            total: state.records.len(),
            revision: self.revision(),
        }
    }

    pub async fn facets(&self) -> Facets {
        self.state.lock().await.facets.clone()
    }

    /// The canonical sequence, in user order.
    pub async fn records(&self) -> Vec<Record> {
        self.state.lock().await.records.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        let state = self.state.lock().await;
        state.records.iter().find(|r| r.id == id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.state.lock().await.records.iter().any(|r| r.id == id)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The document bytes of record `id`.
    pub async fn open(&self, id: &str) -> Result<Vec<u8>, CatalogError> {
        if !self.contains(id).await {
            return Err(CatalogError::NotFound(id.to_owned()));
        }
        match self.blob_store.get(id).await {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => Err(CatalogError::BlobMissing(id.to_owned())),
            Err(source) => Err(CatalogError::BlobRead {
                id: id.to_owned(),
                source,
            }),
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Delete stored documents that no record points to, returning their ids.
    ///
    /// Such documents are left behind when the process stops between a blob
    /// write and the matching snapshot save. Nothing calls this implicitly.
    pub async fn sweep_orphaned_blobs(&self) -> Result<Vec<String>, CatalogError> {
        let state = self.state.lock().await;
        let stored = self.blob_store.list_ids().await.map_err(|source| {
            CatalogError::BlobRead {
                id: "*".to_owned(),
                source,
            }
        })?;

        let referenced: HashSet<&str> = state
            .records
            .iter()
            .map(|r| r.id.as_str())
            .chain(state.pending.iter().map(String::as_str))
            .collect();

        let mut removed = vec![];
        for id in stored {
            if referenced.contains(id.as_str()) {
                continue;
            }
            self.blob_store
                .delete(&id)
                .await
                .map_err(|source| CatalogError::BlobWrite {
                    id: id.clone(),
                    source,
                })?;
            removed.push(id);
        }
        info!("Swept {} orphaned blobs", removed.len());
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::InMemoryBlobStore;
    use crate::catalog_store::InMemoryCatalogStore;

    async fn engine_with(
        names: &[&str],
    ) -> (CatalogEngine, Arc<InMemoryCatalogStore>, Arc<InMemoryBlobStore>) {
        let records: Vec<Record> = names
            .iter()
            .map(|name| Record::new(name.to_lowercase(), *name, None))
            .collect();
        let catalog_store = Arc::new(InMemoryCatalogStore::with_records(&records).unwrap());
        let blob_store = Arc::new(InMemoryBlobStore::new());
        for record in &records {
            blob_store.put(&record.id, b"%PDF").await.unwrap();
        }
        let engine = CatalogEngine::load(catalog_store.clone(), blob_store.clone())
            .await
            .unwrap();
        (engine, catalog_store, blob_store)
    }

    async fn ids(engine: &CatalogEngine) -> Vec<String> {
        engine.records().await.into_iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn load_drops_duplicate_ids() {
        let records = vec![
            Record::new("a", "First", None),
            Record::new("a", "Second", None),
            Record::new("b", "Third", None),
        ];
        let store = Arc::new(InMemoryCatalogStore::with_records(&records).unwrap());
        let engine = CatalogEngine::load(store, Arc::new(InMemoryBlobStore::new()))
            .await
            .unwrap();

        assert_eq!(ids(&engine).await, vec!["a", "b"]);
        assert_eq!(engine.get("a").await.unwrap().name, "First");
    }

    #[tokio::test]
    async fn add_rejects_duplicate_id() {
        let (engine, store, _) = engine_with(&["A"]).await;
        let result = engine.add(Record::new("a", "Other", None)).await;
        assert!(matches!(result, Err(CatalogError::DuplicateId(id)) if id == "a"));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn reorder_to_same_index_saves_nothing() {
        let (engine, store, _) = engine_with(&["A", "B"]).await;
        let revision = engine.revision();
        engine.reorder(1, 1).await.unwrap();
        assert_eq!(store.save_count(), 0);
        assert_eq!(engine.revision(), revision);
    }

    #[tokio::test]
    async fn reorder_checks_both_indices() {
        let (engine, _, _) = engine_with(&["A", "B"]).await;
        assert!(matches!(
            engine.reorder(2, 0).await,
            Err(CatalogError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            engine.reorder(0, 5).await,
            Err(CatalogError::IndexOutOfRange { index: 5, len: 2 })
        ));
        assert_eq!(ids(&engine).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn reorder_moves_towards_the_front() {
        let (engine, _, _) = engine_with(&["A", "B", "C", "D"]).await;
        engine.reorder(3, 1).await.unwrap();
        assert_eq!(ids(&engine).await, vec!["a", "d", "b", "c"]);
    }

    #[tokio::test]
    async fn reorder_by_id_uses_canonical_positions() {
        let (engine, _, _) = engine_with(&["Zeca", "Ana", "Maria"]).await;
        engine.reorder_by_id("ana", "zeca").await.unwrap();
        assert_eq!(ids(&engine).await, vec!["ana", "zeca", "maria"]);

        assert!(matches!(
            engine.reorder_by_id("nobody", "zeca").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn subscribers_see_each_commit() {
        let (engine, _, _) = engine_with(&["A"]).await;
        let mut changes = engine.subscribe();
        engine.toggle_favorite("a").await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 1);

        engine.rename("a", "X - Y", "", "").await.unwrap();
        changes.changed().await.unwrap();
        assert_eq!(*changes.borrow_and_update(), 2);
    }

    #[tokio::test]
    async fn reservations_block_ids_until_released_or_added() {
        let (engine, _, _) = engine_with(&["A"]).await;
        assert!(!engine.reserve_id("a").await);
        assert!(engine.reserve_id("new").await);
        assert!(!engine.reserve_id("new").await);

        engine.release_id("new").await;
        assert!(engine.reserve_id("new").await);

        engine.add(Record::new("new", "New", None)).await.unwrap();
        assert!(engine.state.lock().await.pending.is_empty());
    }

    #[tokio::test]
    async fn sweep_skips_records_and_reservations() {
        let (engine, _, blobs) = engine_with(&["A"]).await;
        blobs.put("orphan", b"%PDF").await.unwrap();
        blobs.put("in-flight", b"%PDF").await.unwrap();
        assert!(engine.reserve_id("in-flight").await);

        let removed = engine.sweep_orphaned_blobs().await.unwrap();

        assert_eq!(removed, vec!["orphan"]);
        let mut left = blobs.list_ids().await.unwrap();
        left.sort();
        assert_eq!(left, vec!["a", "in-flight"]);
    }

    #[tokio::test]
    async fn open_distinguishes_missing_record_and_missing_blob() {
        let (engine, _, blobs) = engine_with(&["A"]).await;
        assert_eq!(engine.open("a").await.unwrap(), b"%PDF");

        assert!(matches!(
            engine.open("zzz").await,
            Err(CatalogError::NotFound(_))
        ));

        blobs.delete("a").await.unwrap();
        assert!(matches!(
            engine.open("a").await,
            Err(CatalogError::BlobMissing(_))
        ));
    }

    #[tokio::test]
    async fn render_reports_total_and_revision() {
        let (engine, _, _) = engine_with(&["B - x", "A - y"]).await;
        engine.toggle_favorite("b - x").await.unwrap();

        let view = engine.render(&ViewQuery::all().favorites_only(true)).await;
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total, 2);
        assert_eq!(view.revision, 1);
        assert_eq!(view.facets.artists, vec!["B", "A"]);
    }
}
