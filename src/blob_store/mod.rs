//! Binary document storage, keyed by record id.

mod memory_store;
mod schema;
mod sqlite_store;
mod trait_def;

pub use memory_store::InMemoryBlobStore;
pub use schema::BLOB_VERSIONED_SCHEMAS;
pub use sqlite_store::SqliteBlobStore;
pub use trait_def::BlobStore;
