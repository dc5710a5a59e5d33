//! SQLite-backed blob store.
//!
//! Documents live in the `pdfs` table of a dedicated database, next to their
//! size and SHA-256 digest. Each call runs as its own statement, so a write is
//! either fully visible or not at all.

use super::schema::BLOB_VERSIONED_SCHEMAS;
use super::trait_def::BlobStore;
use crate::sqlite_persistence::VersionedSchema;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqliteBlobStore {
    conn: Arc<Mutex<Connection>>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl SqliteBlobStore {
    /// Open or create the blob database at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let mut conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open blob database {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        VersionedSchema::open_latest(&mut conn, BLOB_VERSIONED_SCHEMAS)
            .with_context(|| format!("Invalid blob database schema in {:?}", db_path))?;

        let (count, total_size): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM pdfs",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        info!(
            "Opened blob store at {:?}: {} documents, {} bytes",
            db_path, count, total_size
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn put(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let digest = sha256_hex(bytes);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO pdfs (id, content, size, sha256) VALUES (?1, ?2, ?3, ?4)",
            params![id, bytes, bytes.len() as i64, digest],
        )
        .with_context(|| format!("Failed to insert blob {}", id))?;
        debug!("Stored blob {} ({} bytes)", id, bytes.len());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>, String)> = {
            let conn = self.conn.lock().unwrap();
            conn.query_row(
                "SELECT content, sha256 FROM pdfs WHERE id = ?1",
                params![id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
        };

        match row {
            None => Ok(None),
            Some((content, expected)) => {
                if sha256_hex(&content) != expected {
                    bail!("Blob {} is corrupted: checksum mismatch", id);
                }
                Ok(Some(content))
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let removed = conn
            .execute("DELETE FROM pdfs WHERE id = ?1", params![id])
            .with_context(|| format!("Failed to delete blob {}", id))?;
        debug!("Deleted blob {} ({} rows)", id, removed);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT id FROM pdfs ORDER BY created, rowid")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM pdfs", [], |r| r.get(0))?;
        Ok(count as usize)
    }
}
