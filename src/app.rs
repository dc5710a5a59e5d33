//! Wiring of stores, engine and ingestion into one catalog handle.

use crate::blob_store::{BlobStore, SqliteBlobStore};
use crate::catalog::CatalogEngine;
use crate::catalog_store::{CatalogStore, JsonFileCatalogStore};
use crate::config::{AppConfig, PreviewSettings};
use crate::error::{CatalogError, StoreKind};
use crate::ingestion::{
    CommandPreviewRenderer, Ingestor, IngestorConfig, NoPreview, PreviewRenderer,
};
use std::sync::Arc;
use tracing::info;

/// An initialized catalog. Obtaining one means both stores opened and the
/// last snapshot was loaded.
#[derive(Clone)]
pub struct Catalog {
    engine: Arc<CatalogEngine>,
    ingestor: Ingestor,
}

impl Catalog {
    /// Open the on-disk stores described by `config`.
    pub async fn open(config: &AppConfig) -> Result<Self, CatalogError> {
        let blob_db_path = config.blob_db_path();
        info!("Opening blob store at {:?}...", blob_db_path);
        let blob_store = tokio::task::spawn_blocking(move || SqliteBlobStore::open(blob_db_path))
            .await
            .map_err(|e| CatalogError::store_unavailable(StoreKind::Blob, e.into()))?
            .map_err(|e| CatalogError::store_unavailable(StoreKind::Blob, e))?;

        let snapshot_path = config.snapshot_path();
        info!("Opening catalog snapshot at {:?}...", snapshot_path);
        let catalog_store = JsonFileCatalogStore::open(&snapshot_path)
            .map_err(|e| CatalogError::store_unavailable(StoreKind::Catalog, e))?;

        Self::with_stores(
            Arc::new(catalog_store),
            Arc::new(blob_store),
            preview_renderer(&config.preview),
            IngestorConfig {
                max_file_size: config.max_file_size,
            },
        )
        .await
    }

    /// Build a catalog on already opened stores.
    pub async fn with_stores(
        catalog_store: Arc<dyn CatalogStore>,
        blob_store: Arc<dyn BlobStore>,
        previews: Arc<dyn PreviewRenderer>,
        ingestor_config: IngestorConfig,
    ) -> Result<Self, CatalogError> {
        let engine = Arc::new(CatalogEngine::load(catalog_store, blob_store).await?);
        let ingestor = Ingestor::new(engine.clone(), previews, ingestor_config);
        Ok(Self { engine, ingestor })
    }

    pub fn engine(&self) -> &Arc<CatalogEngine> {
        &self.engine
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }
}

pub fn preview_renderer(settings: &PreviewSettings) -> Arc<dyn PreviewRenderer> {
    if settings.enabled {
        Arc::new(CommandPreviewRenderer::new(
            settings.command.clone(),
            settings.args.clone(),
        ))
    } else {
        Arc::new(NoPreview)
    }
}
