use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub data_dir: Option<String>,
    pub blob_db_file: Option<String>,
    pub snapshot_file: Option<String>,
    pub max_file_size_mb: Option<u64>,

    pub preview: Option<PreviewConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct PreviewConfig {
    pub enabled: Option<bool>,
    /// Rasterizer program, fed the PDF on stdin.
    pub command: Option<String>,
    pub args: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cifras.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/cifras"
blob_db_file = "docs.db"
snapshot_file = "meta.json"
max_file_size_mb = 20

[preview]
enabled = true
command = "mutool"
args = ["draw", "-F", "png", "-o", "-", "-"]
"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.data_dir.as_deref(), Some("/srv/cifras"));
        assert_eq!(config.blob_db_file.as_deref(), Some("docs.db"));
        assert_eq!(config.snapshot_file.as_deref(), Some("meta.json"));
        assert_eq!(config.max_file_size_mb, Some(20));
        let preview = config.preview.unwrap();
        assert_eq!(preview.enabled, Some(true));
        assert_eq!(preview.command.as_deref(), Some("mutool"));
        assert_eq!(preview.args.unwrap().len(), 6);
    }

    #[test]
    fn missing_keys_are_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cifras.toml");
        std::fs::write(&path, "[preview]\nenabled = false\n").unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert!(config.data_dir.is_none());
        assert!(config.max_file_size_mb.is_none());
        assert_eq!(config.preview.unwrap().enabled, Some(false));
    }

    #[test]
    fn reports_unreadable_and_invalid_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.toml");
        let err = FileConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let invalid = dir.path().join("invalid.toml");
        std::fs::write(&invalid, "data_dir = [").unwrap();
        let err = FileConfig::load(&invalid).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
