use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::context::Context;
use crate::error::KVError;
use crate::record::{KeyValue, KeyValueList};
use crate::traits::Store;

/// MemoryStore keeps records in an ordered map from key to the values
/// written under it, oldest first. Prefix lookups seek straight to the first
/// key `>= prefix` and stop at the first key that no longer matches.
///
/// Every operation runs under a single lock acquisition, which makes each
/// call atomic. Nothing is persisted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records (counting duplicates of the same key). Fails
    /// if a writer panicked while holding the lock.
    pub fn len(&self) -> Result<usize, KVError> {
        Ok(self.read()?.values().map(Vec::len).sum())
    }

    pub fn is_empty(&self) -> Result<bool, KVError> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Vec<String>>>, KVError> {
        self.entries
            .read()
            .map_err(|e| KVError::Storage(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Vec<String>>>, KVError> {
        self.entries
            .write()
            .map_err(|e| KVError::Storage(e.to_string()))
    }
}

/// Range bounds starting at the first key `>= prefix`.
fn from_prefix(prefix: &str) -> (Bound<&str>, Bound<&str>) {
    (Bound::Included(prefix), Bound::Unbounded)
}

/// Keys in `map` that start with `prefix`, in order.
fn matching_keys(map: &BTreeMap<String, Vec<String>>, prefix: &str) -> Vec<String> {
    map.range::<str, _>(from_prefix(prefix))
        .take_while(|(key, _)| key.starts_with(prefix))
        .map(|(key, _)| key.clone())
        .collect()
}

impl Store for MemoryStore {
    fn fetch(&self, ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError> {
        ctx.check()?;
        let entries = self.read()?;
        ctx.check()?;

        let mut results = KeyValueList::new();
        for (key, values) in entries.range::<str, _>(from_prefix(prefix)) {
            if !key.starts_with(prefix) {
                break;
            }
            for value in values {
                results.push(KeyValue::new(key.as_str(), value.as_str()));
            }
        }
        Ok(results)
    }

    fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let mut map = self.write()?;
        // Last chance to bail out; past this point the batch is applied whole.
        ctx.check()?;

        for entry in entries {
            map.entry(entry.path.clone())
                .or_default()
                .push(entry.value.clone());
        }
        debug!("MemoryStore: appended {} entries", entries.len());
        Ok(())
    }

    fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let mut map = self.write()?;
        ctx.check()?;

        for entry in entries {
            map.insert(entry.path.clone(), vec![entry.value.clone()]);
        }
        debug!("MemoryStore: upserted {} entries", entries.len());
        Ok(())
    }

    fn delete(&self, ctx: &Context, prefix: &str) -> Result<usize, KVError> {
        ctx.check()?;
        let mut map = self.write()?;
        ctx.check()?;

        let keys = matching_keys(&map, prefix);
        let mut removed = 0;
        for key in keys {
            if let Some(values) = map.remove(&key) {
                removed += values.len();
            }
        }
        debug!("MemoryStore: deleted {} records under {:?}", removed, prefix);
        Ok(removed)
    }
}
