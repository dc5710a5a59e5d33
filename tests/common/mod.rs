//! Common test infrastructure
//!
//! Fixtures for building catalogs either fully in memory or on a temporary
//! data directory, plus store doubles whose writes can be made to fail.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use cifras_catalog::config::{AppConfig, CliConfig};
use cifras_catalog::ingestion::{NoPreview, PreviewRenderer};
use cifras_catalog::{
    BlobStore, Catalog, CatalogEngine, CatalogStore, InMemoryBlobStore, InMemoryCatalogStore,
    IngestorConfig, RawFile, Record,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n";

pub fn pdf(name: &str) -> RawFile {
    RawFile::new(name, PDF_BYTES.to_vec())
}

/// Records named after `names`, with ids `r0`, `r1`, ...
pub fn records(names: &[&str]) -> Vec<Record> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Record::new(format!("r{}", i), *name, None))
        .collect()
}

pub fn names(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.name.clone()).collect()
}

/// Catalog store that can be told to fail its saves.
#[derive(Default)]
pub struct FlakyCatalogStore {
    inner: InMemoryCatalogStore,
    fail_saves: AtomicBool,
    failed_saves: AtomicUsize,
}

impl FlakyCatalogStore {
    pub fn with_records(records: &[Record]) -> Self {
        Self {
            inner: InMemoryCatalogStore::with_records(records).unwrap(),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub fn failed_saves(&self) -> usize {
        self.failed_saves.load(Ordering::SeqCst)
    }

    /// What a restart would see.
    pub async fn stored(&self) -> Vec<Record> {
        self.inner.load().await.unwrap()
    }
}

#[async_trait]
impl CatalogStore for FlakyCatalogStore {
    async fn load(&self) -> Result<Vec<Record>> {
        self.inner.load().await
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            self.failed_saves.fetch_add(1, Ordering::SeqCst);
            bail!("disk full");
        }
        self.inner.save(records).await
    }
}

/// Catalog store whose snapshot cannot be read at all.
pub struct UnreadableCatalogStore;

#[async_trait]
impl CatalogStore for UnreadableCatalogStore {
    async fn load(&self) -> Result<Vec<Record>> {
        bail!("permission denied")
    }

    async fn save(&self, _records: &[Record]) -> Result<()> {
        bail!("permission denied")
    }
}

/// Blob store that can be told to fail its writes.
#[derive(Default)]
pub struct FlakyBlobStore {
    pub inner: InMemoryBlobStore,
    fail_puts: AtomicBool,
}

impl FlakyBlobStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_puts.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            bail!("database is locked");
        }
        self.inner.put(id, bytes).await
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        self.inner.list_ids().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

/// A catalog on in-memory doubles, with handles to inspect them.
pub struct MemoryCatalog {
    pub catalog: Catalog,
    pub catalog_store: Arc<FlakyCatalogStore>,
    pub blob_store: Arc<FlakyBlobStore>,
}

impl MemoryCatalog {
    pub async fn new() -> Self {
        Self::with_records(&[]).await
    }

    pub async fn with_records(records: &[Record]) -> Self {
        let catalog_store = Arc::new(FlakyCatalogStore::with_records(records));
        let blob_store = Arc::new(FlakyBlobStore::default());
        for record in records {
            blob_store.put(&record.id, PDF_BYTES).await.unwrap();
        }
        let previews: Arc<dyn PreviewRenderer> = Arc::new(NoPreview);
        let catalog = Catalog::with_stores(
            catalog_store.clone(),
            blob_store.clone(),
            previews,
            IngestorConfig::default(),
        )
        .await
        .unwrap();
        Self {
            catalog,
            catalog_store,
            blob_store,
        }
    }

    pub fn engine(&self) -> &Arc<CatalogEngine> {
        self.catalog.engine()
    }
}

/// Config for a catalog living in `dir`, without previews.
pub fn disk_config(dir: &TempDir) -> AppConfig {
    let cli = CliConfig {
        data_dir: Some(dir.path().to_path_buf()),
        no_preview: true,
        ..Default::default()
    };
    AppConfig::resolve(&cli, None).unwrap()
}
