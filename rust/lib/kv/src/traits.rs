use crate::context::Context;
use crate::error::KVError;
use crate::record::KeyValueList;

/// Store is the storage-backend contract behind a [`Client`](crate::Client).
///
/// Stores never see wildcard syntax: every `prefix` is a plain literal and a
/// record matches when its key starts with it. Each call is atomic: it
/// commits completely or not at all, including when the context is
/// cancelled mid-way. Stores do not retry.
pub trait Store: Send + Sync {
    /// Every live record whose key starts with `prefix`, ordered by key and
    /// then by insertion order. An empty result is not an error.
    fn fetch(&self, ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError>;

    /// Insert every entry as a new record. Writing an existing key adds a
    /// second record for it rather than replacing the first.
    fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError>;

    /// Replace all records for each entry's exact key with the entry's value.
    /// When a batch names the same key twice, the later entry wins.
    fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError>;

    /// Remove every live record whose key starts with `prefix` and return how
    /// many were removed. Deleting a prefix that matches nothing returns 0.
    fn delete(&self, ctx: &Context, prefix: &str) -> Result<usize, KVError>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn fetch(&self, ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError> {
        (**self).fetch(ctx, prefix)
    }

    fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        (**self).append(ctx, entries)
    }

    fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        (**self).upsert(ctx, entries)
    }

    fn delete(&self, ctx: &Context, prefix: &str) -> Result<usize, KVError> {
        (**self).delete(ctx, prefix)
    }
}
