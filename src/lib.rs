//! Cifras Catalog Library
//!
//! A personal catalog of PDF documents: an ordered, editable record list kept
//! in a JSON snapshot, with the documents themselves in a separate SQLite
//! blob store.

pub mod app;
pub mod blob_store;
pub mod catalog;
pub mod catalog_store;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use app::Catalog;
pub use blob_store::{BlobStore, InMemoryBlobStore, SqliteBlobStore};
pub use catalog::{BlobRemoval, CatalogEngine, CatalogView, Facets, Record, ViewQuery};
pub use catalog_store::{CatalogStore, InMemoryCatalogStore, JsonFileCatalogStore};
pub use error::{CatalogError, StoreKind};
pub use ingestion::{Ingestor, IngestorConfig, PreviewRenderer, RawFile};
