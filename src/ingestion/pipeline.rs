//! Ingestion pipeline: raw file in, catalog record out.
//!
//! For each file:
//! 1. Check its size
//! 2. Derive name and artist from the file name
//! 3. Ask the preview renderer for a first-page image
//! 4. Reserve a fresh id and store the bytes under it
//! 5. Append the record to the catalog

use super::preview::PreviewRenderer;
use super::upload::RawFile;
use crate::catalog::{name_from_filename, CatalogEngine, Record};
use crate::error::CatalogError;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default upper bound on a single document.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Maximum file size in bytes.
    pub max_file_size: u64,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Clone)]
pub struct Ingestor {
    engine: Arc<CatalogEngine>,
    previews: Arc<dyn PreviewRenderer>,
    config: IngestorConfig,
}

impl Ingestor {
    pub fn new(
        engine: Arc<CatalogEngine>,
        previews: Arc<dyn PreviewRenderer>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            engine,
            previews,
            config,
        }
    }

    pub fn config(&self) -> &IngestorConfig {
        &self.config
    }

    /// Turn one uploaded file into a stored document and its record.
    pub async fn ingest(&self, file: RawFile) -> Result<Record, CatalogError> {
        if file.is_empty() {
            return Err(CatalogError::EmptyFile(file.name));
        }
        if file.len() > self.config.max_file_size {
            return Err(CatalogError::FileTooLarge(
                file.len(),
                self.config.max_file_size,
            ));
        }

        info!("Ingesting {} ({} bytes)", file.name, file.len());
        let name = name_from_filename(&file.name);
        let preview = self.previews.render(&file.bytes).await;
        if preview.is_none() {
            debug!("No preview for {}", file.name);
        }

        let id = self.reserve_fresh_id().await;
        let blob_store = self.engine.blob_store();
        if let Err(source) = blob_store.put(&id, &file.bytes).await {
            self.engine.release_id(&id).await;
            return Err(CatalogError::BlobWrite { id, source });
        }

        let record = Record::new(id.clone(), name, preview);
        if let Err(e) = self.engine.add(record.clone()).await {
            warn!(
                "Adding {} failed after its blob was stored, removing blob {}",
                file.name, id
            );
            if let Err(cleanup) = blob_store.delete(&id).await {
                warn!("Failed to remove blob {}: {:#}", id, cleanup);
            }
            self.engine.release_id(&id).await;
            return Err(e);
        }

        info!("Ingested {} as {} ({})", file.name, record.id, record.name);
        Ok(record)
    }

    /// Ingest every file concurrently. Results come back in input order, one
    /// per file; a failure does not stop the others.
    pub async fn ingest_many(&self, files: Vec<RawFile>) -> Vec<Result<Record, CatalogError>> {
        join_all(files.into_iter().map(|file| self.ingest(file))).await
    }

    /// Read and ingest files from disk.
    pub async fn ingest_paths<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Vec<Result<Record, CatalogError>> {
        join_all(paths.iter().map(|path| async move {
            let file = RawFile::read(path.as_ref()).await?;
            self.ingest(file).await
        }))
        .await
    }

    async fn reserve_fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.engine.reserve_id(&id).await {
                return id;
            }
            warn!("Generated id {} is already taken, retrying", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{BlobStore, InMemoryBlobStore};
    use crate::catalog_store::InMemoryCatalogStore;
    use crate::ingestion::NoPreview;

    async fn ingestor(max_file_size: u64) -> (Ingestor, Arc<InMemoryBlobStore>) {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let engine = CatalogEngine::load(Arc::new(InMemoryCatalogStore::new()), blobs.clone())
            .await
            .unwrap();
        let ingestor = Ingestor::new(
            Arc::new(engine),
            Arc::new(NoPreview),
            IngestorConfig { max_file_size },
        );
        (ingestor, blobs)
    }

    #[tokio::test]
    async fn rejects_empty_files() {
        let (ingestor, blobs) = ingestor(1024).await;
        let result = ingestor.ingest(RawFile::new("Empty.pdf", vec![])).await;
        assert!(matches!(result, Err(CatalogError::EmptyFile(name)) if name == "Empty.pdf"));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn rejects_oversized_files_before_storing() {
        let (ingestor, blobs) = ingestor(4).await;
        let result = ingestor.ingest(RawFile::new("Big.pdf", b"%PDF-1.4".to_vec())).await;
        assert!(matches!(result, Err(CatalogError::FileTooLarge(8, 4))));
        assert!(blobs.is_empty().await);
        assert!(ingestor.engine.is_empty().await);
    }

    #[tokio::test]
    async fn stores_blob_under_record_id() {
        let (ingestor, blobs) = ingestor(1024).await;
        let record = ingestor
            .ingest(RawFile::new("Artist-Song.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap();

        assert_eq!(
            blobs.get(&record.id).await.unwrap(),
            Some(b"%PDF-1.4".to_vec())
        );
        assert!(Uuid::parse_str(&record.id).is_ok());
        assert!(ingestor.engine.contains(&record.id).await);
        // The reservation is gone once the record exists.
        assert!(!ingestor.engine.reserve_id(&record.id).await);
    }
}
