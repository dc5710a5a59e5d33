//! Raw uploaded files.

use crate::error::CatalogError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A file as handed over by a picker or a drop: a name and its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl RawFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, keeping only the last path component as name.
    pub async fn read(path: &Path) -> Result<Self, CatalogError> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Expand `paths` into the PDF files they designate. Files are kept as given
/// (whatever their extension); directories are walked recursively and only
/// contribute `.pdf` files, in file-name order.
pub fn collect_pdf_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<PathBuf>, CatalogError> {
    let mut out = vec![];
    for path in paths {
        let path = path.as_ref();
        if !path.is_dir() {
            out.push(path.to_path_buf());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                CatalogError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk loop")),
                )
            })?;
            if entry.file_type().is_file() && is_pdf(entry.path()) {
                out.push(entry.into_path());
            }
        }
    }
    Ok(out)
}
