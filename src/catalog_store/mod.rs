//! Persistence of the ordered metadata snapshot.

mod json_file_store;
mod memory_store;
mod trait_def;

pub use json_file_store::JsonFileCatalogStore;
pub use memory_store::InMemoryCatalogStore;
pub use trait_def::CatalogStore;
