mod file_config;

pub use file_config::{FileConfig, PreviewConfig};

use crate::ingestion::{DEFAULT_MAX_FILE_SIZE, DEFAULT_PREVIEW_ARGS, DEFAULT_PREVIEW_PROGRAM};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const DEFAULT_BLOB_DB_FILE: &str = "cifras.db";
pub const DEFAULT_SNAPSHOT_FILE: &str = "cifras_meta.json";

const BYTES_PER_MB: u64 = 1024 * 1024;

/// CLI arguments that take part in config resolution.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub preview_command: Option<String>,
    pub no_preview: bool,
    pub max_file_size_mb: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub blob_db_file: String,
    pub snapshot_file: String,
    /// Maximum accepted document size, in bytes.
    pub max_file_size: u64,
    pub preview: PreviewSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: DEFAULT_PREVIEW_PROGRAM.to_string(),
            args: DEFAULT_PREVIEW_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        if data_dir.exists() && !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let blob_db_file = file
            .blob_db_file
            .unwrap_or_else(|| DEFAULT_BLOB_DB_FILE.to_string());
        let snapshot_file = file
            .snapshot_file
            .unwrap_or_else(|| DEFAULT_SNAPSHOT_FILE.to_string());
        if blob_db_file == snapshot_file {
            bail!(
                "blob_db_file and snapshot_file must differ, both are {:?}",
                blob_db_file
            );
        }

        let max_file_size = file
            .max_file_size_mb
            .or(cli.max_file_size_mb)
            .map(|mb| mb.saturating_mul(BYTES_PER_MB))
            .unwrap_or(DEFAULT_MAX_FILE_SIZE);
        if max_file_size == 0 {
            bail!("max_file_size_mb must be greater than zero");
        }

        let preview_file = file.preview.unwrap_or_default();
        let command = preview_file
            .command
            .or_else(|| cli.preview_command.clone())
            .unwrap_or_else(|| DEFAULT_PREVIEW_PROGRAM.to_string());
        let args = preview_file.args.unwrap_or_else(|| {
            if command == DEFAULT_PREVIEW_PROGRAM {
                PreviewSettings::default().args
            } else {
                vec![]
            }
        });
        let preview = PreviewSettings {
            enabled: preview_file.enabled.unwrap_or(!cli.no_preview),
            command,
            args,
        };

        Ok(Self {
            data_dir,
            blob_db_file,
            snapshot_file,
            max_file_size,
            preview,
        })
    }

    pub fn blob_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.blob_db_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }
}
