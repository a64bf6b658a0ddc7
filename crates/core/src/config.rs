use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_data_dir() -> PathBuf {
    dirs_home().join(".rlm-mcp")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Server-level configuration, loaded from a TOML file by `rlm-server`. This
/// struct and its defaults are what the session engine depends on; the TOML
/// parsing itself is a thin deserialize, not a hardened config layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub database_path: Option<PathBuf>,
    pub blob_dir: Option<PathBuf>,
    pub index_dir: Option<PathBuf>,

    pub default_max_tool_calls: u64,
    pub default_max_chars_per_response: usize,
    pub default_max_chars_per_peek: usize,

    pub max_concurrent_loads: usize,
    pub max_file_size_mb: u64,

    pub log_level: String,
    pub structured_logging: bool,
    pub log_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            data_dir: default_data_dir(),
            database_path: None,
            blob_dir: None,
            index_dir: None,
            default_max_tool_calls: 500,
            default_max_chars_per_response: 50_000,
            default_max_chars_per_peek: 10_000,
            max_concurrent_loads: 8,
            max_file_size_mb: 50,
            log_level: "info".to_string(),
            structured_logging: true,
            log_file: None,
        }
    }
}

impl ServerConfig {
    /// Derived path for the metadata store, defaulting under `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("meta.db"))
    }

    /// Derived path for the blob store root, defaulting under `data_dir`.
    pub fn blob_dir(&self) -> PathBuf {
        self.blob_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("blobs"))
    }

    /// Derived path for the per-session index directory root.
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("indexes"))
    }

    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.blob_dir())?;
        std::fs::create_dir_all(self.index_dir())?;
        if let Some(parent) = self.database_path().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths_default_under_data_dir() {
        let mut cfg = ServerConfig::default();
        cfg.data_dir = PathBuf::from("/tmp/rlm-test");
        assert_eq!(cfg.database_path(), PathBuf::from("/tmp/rlm-test/meta.db"));
        assert_eq!(cfg.blob_dir(), PathBuf::from("/tmp/rlm-test/blobs"));
        assert_eq!(cfg.index_dir(), PathBuf::from("/tmp/rlm-test/indexes"));
    }

    #[test]
    fn explicit_paths_override_derivation() {
        let mut cfg = ServerConfig::default();
        cfg.blob_dir = Some(PathBuf::from("/custom/blobs"));
        assert_eq!(cfg.blob_dir(), PathBuf::from("/custom/blobs"));
    }
}
