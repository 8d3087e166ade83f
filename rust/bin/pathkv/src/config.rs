//! CLI configuration.
//!
//! Reads `~/.pathkv/config.toml`; command-line flags override individual
//! fields.

use std::path::{Path, PathBuf};

use pathkv_kv::PathConfig;
use pathkv_sql::SqlConfig;
use serde::{Deserialize, Serialize};

/// Which Store implementation backs the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process-local, lost on exit.
    Memory,
    /// Embedded redb file.
    #[default]
    Redb,
    /// SQLite file with audit columns and soft delete.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Directory holding the default database files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Database file. Defaults to `{data_dir}/data.redb` or
    /// `{data_dir}/data.sqlite` depending on the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    #[serde(flatten)]
    pub paths: PathConfig,

    #[serde(flatten)]
    pub sql: SqlConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            data_dir: None,
            db_path: None,
            paths: PathConfig::default(),
            sql: SqlConfig::default(),
        }
    }
}

impl CliConfig {
    /// Default config file path: ~/.pathkv/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: CliConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the database file, falling back to the backend's default
    /// file name under the data directory.
    pub fn resolve_db_path(&self) -> PathBuf {
        if let Some(path) = &self.db_path {
            return path.clone();
        }
        let name = match self.backend {
            Backend::Sqlite => "data.sqlite",
            Backend::Memory | Backend::Redb => "data.redb",
        };
        self.data_dir.clone().unwrap_or_else(dirs_path).join(name)
    }
}

/// Return the pathkv config directory (~/.pathkv).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".pathkv")
}
