//! Errors surfaced by catalog operations.

use thiserror::Error;

/// Which of the two backends an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Blob,
    Catalog,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Blob => write!(f, "blob store"),
            StoreKind::Catalog => write!(f, "catalog store"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A backend could not be initialized. Fatal: no catalog is produced.
    #[error("{store} unavailable: {source:#}")]
    StoreUnavailable {
        store: StoreKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to persist catalog snapshot: {0:#}")]
    CatalogWrite(#[source] anyhow::Error),

    #[error("Failed to write blob {id}: {source:#}")]
    BlobWrite {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to read blob {id}: {source:#}")]
    BlobRead {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("A record with id {0} already exists")]
    DuplicateId(String),

    #[error("Index {index} out of range for catalog of {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No document stored for record {0}")]
    BlobMissing(String),

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),

    #[error("File is empty: {0}")]
    EmptyFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn store_unavailable(store: StoreKind, source: anyhow::Error) -> Self {
        CatalogError::StoreUnavailable { store, source }
    }
}
