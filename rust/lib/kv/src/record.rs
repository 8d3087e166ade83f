use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::error::KVError;

/// One stored record. Backend bookkeeping (row ids, timestamps, sequence
/// numbers) never shows up here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyValue {
    pub path: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Ordered list of records: caller order for writes, key order (then
/// insertion order within a key) for fetches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValueList(Vec<KeyValue>);

impl KeyValueList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| KeyValue::new(k, v))
            .collect()
    }

    pub fn push(&mut self, entry: KeyValue) {
        self.0.push(entry);
    }

    /// First value stored under exactly `path`.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kv| kv.path == path)
            .map(|kv| kv.value.as_str())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|kv| kv.path.as_str())
    }

    pub fn into_inner(self) -> Vec<KeyValue> {
        self.0
    }
}

impl Deref for KeyValueList {
    type Target = [KeyValue];

    fn deref(&self) -> &[KeyValue] {
        &self.0
    }
}

impl From<Vec<KeyValue>> for KeyValueList {
    fn from(entries: Vec<KeyValue>) -> Self {
        Self(entries)
    }
}

impl FromIterator<KeyValue> for KeyValueList {
    fn from_iter<T: IntoIterator<Item = KeyValue>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for KeyValueList {
    type Item = KeyValue;
    type IntoIter = std::vec::IntoIter<KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a KeyValueList {
    type Item = &'a KeyValue;
    type IntoIter = std::slice::Iter<'a, KeyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a list from interleaved keys and values: `kv(&["a", "1", "b", "2"])`.
///
/// An odd number of arguments is a caller bug and is rejected rather than
/// dropping the trailing key.
pub fn kv<S: AsRef<str>>(keys_and_values: &[S]) -> Result<KeyValueList, KVError> {
    if keys_and_values.len() % 2 != 0 {
        return Err(KVError::Validation(format!(
            "kv needs key/value pairs, got {} arguments",
            keys_and_values.len()
        )));
    }
    Ok(keys_and_values
        .chunks_exact(2)
        .map(|pair| KeyValue::new(pair[0].as_ref(), pair[1].as_ref()))
        .collect())
}

/// Build a [`KeyValueList`] from `key => value` pairs.
///
/// ```
/// let list = pathkv_kv::kv!("users/1" => "alice", "users/2" => "bob");
/// assert_eq!(list.len(), 2);
/// ```
#[macro_export]
macro_rules! kv {
    () => {
        $crate::KeyValueList::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::KeyValueList::from(vec![$($crate::KeyValue::new($key, $value)),+])
    };
}
