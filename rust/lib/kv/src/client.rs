use std::sync::Arc;

use tracing::{debug, warn};

use crate::context::Context;
use crate::error::KVError;
use crate::path::{Path, PathConfig, validate_key};
use crate::record::KeyValueList;
use crate::traits::Store;

/// Client is what callers hold: it builds paths with its [`PathConfig`] and
/// forwards Fetch/Put/Delete to a [`Store`], handing the store only the
/// literal prefix of each path.
///
/// Written keys are validated before any backend call. Backend and
/// cancellation errors come back wrapped with the operation and the path or
/// batch involved.
#[derive(Clone)]
pub struct Client {
    store: Arc<dyn Store>,
    paths: PathConfig,
}

impl Client {
    pub fn new<S: Store + 'static>(store: S) -> Self {
        Self::with_config(Arc::new(store), PathConfig::default())
    }

    pub fn with_config(store: Arc<dyn Store>, paths: PathConfig) -> Self {
        Self { store, paths }
    }

    pub fn path_config(&self) -> &PathConfig {
        &self.paths
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Join segments with this client's separator.
    pub fn path<I, S>(&self, segments: I) -> Result<Path, KVError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.paths.join(segments)
    }

    /// Parse a raw path (`users/*`, `users/1`).
    pub fn parse(&self, raw: &str) -> Result<Path, KVError> {
        Path::parse(raw)
    }

    pub fn fetch(&self, ctx: &Context, path: &Path) -> Result<KeyValueList, KVError> {
        let prefix = path.trim_dynamic();
        let results = self
            .store
            .fetch(ctx, prefix)
            .map_err(|e| fail("fetch", path.to_string(), e))?;
        debug!("fetch {}: {} records", path, results.len());
        Ok(results)
    }

    /// Put appends: see [`Client::append`].
    pub fn put(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        self.append(ctx, entries)
    }

    /// Insert every entry as a new record, keeping earlier records for the
    /// same key.
    pub fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        if !validate_batch(entries)? {
            return Ok(());
        }
        self.store
            .append(ctx, entries)
            .map_err(|e| fail("append", batch_target(entries), e))
    }

    /// Replace whatever is stored under each entry's key.
    pub fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        if !validate_batch(entries)? {
            return Ok(());
        }
        self.store
            .upsert(ctx, entries)
            .map_err(|e| fail("upsert", batch_target(entries), e))
    }

    /// Delete everything under the path's prefix and return how many
    /// records went away.
    pub fn delete(&self, ctx: &Context, path: &Path) -> Result<usize, KVError> {
        let prefix = path.trim_dynamic();
        let removed = self
            .store
            .delete(ctx, prefix)
            .map_err(|e| fail("delete", path.to_string(), e))?;
        debug!("delete {}: {} records", path, removed);
        Ok(removed)
    }
}

/// Validate every key in a write batch. Returns false for an empty batch,
/// which is a no-op.
fn validate_batch(entries: &KeyValueList) -> Result<bool, KVError> {
    if entries.is_empty() {
        debug!("skipping empty write batch");
        return Ok(false);
    }
    for entry in entries {
        validate_key(&entry.path)?;
    }
    Ok(true)
}

fn batch_target(entries: &KeyValueList) -> String {
    match entries.len() {
        1 => entries[0].path.clone(),
        n => format!("{} entries", n),
    }
}

fn fail(op: &'static str, target: String, e: KVError) -> KVError {
    warn!("{} {} failed: {}", op, target, e);
    e.context(op, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::MemoryStore;
    use crate::record::{KeyValue, kv};
    use std::sync::Mutex;

    /// Records what the store was asked, to check the client never leaks
    /// wildcard syntax.
    #[derive(Default)]
    struct Recording {
        prefixes: Mutex<Vec<String>>,
    }

    impl Store for Recording {
        fn fetch(&self, _ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError> {
            self.prefixes.lock().unwrap().push(prefix.to_string());
            Ok(KeyValueList::new())
        }

        fn append(&self, _ctx: &Context, _entries: &KeyValueList) -> Result<(), KVError> {
            Err(KVError::Storage("connection refused".into()))
        }

        fn upsert(&self, _ctx: &Context, _entries: &KeyValueList) -> Result<(), KVError> {
            panic!("validation should have stopped this call");
        }

        fn delete(&self, _ctx: &Context, prefix: &str) -> Result<usize, KVError> {
            self.prefixes.lock().unwrap().push(prefix.to_string());
            Ok(0)
        }
    }

    #[test]
    fn store_sees_trimmed_prefixes() {
        let store = Arc::new(Recording::default());
        let client = Client::with_config(store.clone(), PathConfig::default());
        let ctx = Context::background();

        client.fetch(&ctx, &Path::parse("users/*").unwrap()).unwrap();
        client.fetch(&ctx, &Path::parse("users/1").unwrap()).unwrap();
        client.delete(&ctx, &client.path(["users", "*"]).unwrap()).unwrap();

        assert_eq!(*store.prefixes.lock().unwrap(), vec!["users/", "users/1", "users/"]);
    }

    #[test]
    fn backend_errors_carry_operation_context() {
        let client = Client::new(Recording::default());
        let err = client
            .put(&Context::background(), &kv(&["users/1", "x"]).unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(
            err.to_string(),
            "append users/1: storage error: connection refused"
        );
    }

    #[test]
    fn invalid_keys_never_reach_the_store() {
        let client = Client::new(Recording::default());
        let ctx = Context::background();
        for bad in ["", "users/*", "bad\u{7}key"] {
            let batch = KeyValueList::from(vec![KeyValue::new(bad, "v")]);
            assert!(client.upsert(&ctx, &batch).unwrap_err().is_validation());
        }
        assert!(client.upsert(&ctx, &KeyValueList::new()).is_ok());
    }

    #[test]
    fn invalid_paths_are_rejected_before_the_store() {
        let store = Arc::new(Recording::default());
        let client = Client::with_config(store.clone(), PathConfig::default());
        assert!(client.parse("").unwrap_err().is_validation());
        assert!(client.parse("a*b\n").unwrap_err().is_validation());
        assert!(Path::prefix("").unwrap_err().is_validation());
        assert!(client.path(Vec::<&str>::new()).unwrap_err().is_validation());
        assert!(store.prefixes.lock().unwrap().is_empty());

        // Only the explicit bare marker reaches the store as an empty prefix.
        client.delete(&Context::background(), &client.parse("*").unwrap()).unwrap();
        assert_eq!(*store.prefixes.lock().unwrap(), vec![""]);
    }

    #[test]
    fn custom_separator_flows_into_paths() {
        let client = Client::with_config(
            Arc::new(MemoryStore::new()),
            PathConfig::new(":").unwrap(),
        );
        let ctx = Context::background();
        let key = client.path(["config", "model", "h106"]).unwrap();
        client
            .put(&ctx, &crate::kv!(key.as_str() => "yaml"))
            .unwrap();

        let got = client.fetch(&ctx, &client.path(["config", "*"]).unwrap()).unwrap();
        assert_eq!(got.get("config:model:h106"), Some("yaml"));
    }

    #[test]
    fn cancellation_is_reported_with_context() {
        let client = Client::new(MemoryStore::new());
        let ctx = Context::background();
        ctx.cancel();
        let err = client.fetch(&ctx, &Path::parse("*").unwrap()).unwrap_err();
        assert!(err.is_cancellation());
        assert!(err.to_string().starts_with("fetch *:"));
    }
}
