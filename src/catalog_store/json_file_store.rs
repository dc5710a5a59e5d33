//! Catalog snapshot kept in a single JSON file.
//!
//! Every save serializes the full sequence, writes it to a temporary file in
//! the same directory and renames it over the previous snapshot, so readers
//! only ever see a complete snapshot.

use super::trait_def::CatalogStore;
use crate::catalog::Record;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub struct JsonFileCatalogStore {
    path: PathBuf,
}

impl JsonFileCatalogStore {
    /// Prepare a store writing to `path`. The parent directory is created if
    /// needed; the file itself is only created on the first save.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_dir() {
            bail!("Catalog snapshot path {:?} is a directory", path);
        }
        let parent = parent_dir(&path);
        std::fs::create_dir_all(&parent)
            .with_context(|| format!("Failed to create catalog directory {:?}", parent))?;
        info!("Using catalog snapshot at {:?}", path);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

#[async_trait]
impl CatalogStore for JsonFileCatalogStore {
    async fn load(&self) -> Result<Vec<Record>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read catalog snapshot {:?}", self.path))
            }
        };
        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(vec![]);
        }
        let records: Vec<Record> = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse catalog snapshot {:?}", self.path))?;
        debug!("Loaded {} records from {:?}", records.len(), self.path);
        Ok(records)
    }

    async fn save(&self, records: &[Record]) -> Result<()> {
        let contents = serde_json::to_vec(records)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, &contents))
            .await
            .context("Snapshot writer task failed")?
            .with_context(|| format!("Failed to write catalog snapshot {:?}", self.path))?;
        debug!("Saved {} records to {:?}", records.len(), self.path);
        Ok(())
    }
}
