//! Turn a [`CliConfig`] into a ready [`Client`].

use std::sync::Arc;

use anyhow::{Context as _, Result};
use pathkv_kv::{Client, MemoryStore, RedbStore, Store};
use pathkv_sql::SqliteStore;
use tracing::debug;

use crate::config::{Backend, CliConfig};

pub fn client(config: &CliConfig) -> Result<Client> {
    config.paths.validate()?;
    let store: Arc<dyn Store> = match config.backend {
        Backend::Memory => Arc::new(MemoryStore::new()),
        Backend::Redb => {
            let path = config.resolve_db_path();
            ensure_parent(&path)?;
            Arc::new(
                RedbStore::open(&path)
                    .with_context(|| format!("failed to open redb store at {}", path.display()))?,
            )
        }
        Backend::Sqlite => {
            let path = config.resolve_db_path();
            ensure_parent(&path)?;
            Arc::new(
                SqliteStore::open(&path, &config.sql)
                    .with_context(|| format!("failed to open SQLite store at {}", path.display()))?,
            )
        }
    };
    debug!("using {:?} backend", config.backend);
    Ok(Client::with_config(store, config.paths.clone()))
}

fn ensure_parent(path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathkv_kv::{Context, kv};

    #[test]
    fn sqlite_backend_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = CliConfig {
            backend: Backend::Sqlite,
            data_dir: Some(tmp.path().join("nested")),
            ..Default::default()
        };
        let client = client(&config).unwrap();
        let ctx = Context::background();
        client.put(&ctx, &kv(&["a/1", "x"]).unwrap()).unwrap();

        let again = super::client(&config).unwrap();
        let got = again.fetch(&ctx, &again.parse("a/*").unwrap()).unwrap();
        assert_eq!(got.get("a/1"), Some("x"));
    }

    #[test]
    fn bad_separator_is_rejected() {
        let mut config = CliConfig {
            backend: Backend::Memory,
            ..Default::default()
        };
        config.paths.separator = String::new();
        assert!(client(&config).is_err());
    }
}
