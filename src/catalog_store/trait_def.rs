//! CatalogStore trait definition.

use crate::catalog::Record;
use anyhow::Result;
use async_trait::async_trait;

/// Storage backend for the catalog snapshot.
///
/// The whole ordered sequence is read and written at once; there are no
/// per-record operations.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Read the last saved sequence. A store that was never written returns
    /// an empty sequence.
    async fn load(&self) -> Result<Vec<Record>>;

    /// Replace the stored sequence with `records`, order included.
    async fn save(&self, records: &[Record]) -> Result<()>;
}
