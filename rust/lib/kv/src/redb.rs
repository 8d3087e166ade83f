use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tracing::{debug, warn};

use crate::context::Context;
use crate::error::{KVError, storage_err};
use crate::record::{KeyValue, KeyValueList};
use crate::traits::Store;

/// Records keyed by `(key, seq)`. The sequence number keeps duplicate keys
/// apart and preserves insertion order within a key.
const ENTRIES: TableDefinition<(&str, u64), &str> = TableDefinition::new("entries");

/// Bookkeeping: next sequence number to hand out.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const NEXT_SEQ: &str = "next_seq";

/// RedbStore is a Store backed by redb, a pure-Rust embedded key-value
/// database. Every write runs in one redb write transaction, so a failed or
/// cancelled call leaves the file untouched. Deletes are physical.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage_err)?;

        // Ensure both tables exist so read transactions can open them.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            write_txn.open_table(ENTRIES).map_err(storage_err)?;
            write_txn.open_table(META).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        debug!("RedbStore: opened {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }

    /// Commit `txn` unless the context was cancelled while it was being
    /// filled, in which case it is aborted and the cancellation returned.
    fn finish(ctx: &Context, txn: WriteTransaction) -> Result<(), KVError> {
        if let Err(e) = ctx.check() {
            txn.abort().map_err(storage_err)?;
            warn!("RedbStore: write aborted: {}", e);
            return Err(e);
        }
        txn.commit().map_err(storage_err)
    }
}

/// `(key, seq)` pairs of every record whose key starts with `prefix`.
fn matching_rows<T>(table: &T, prefix: &str) -> Result<Vec<(String, u64)>, KVError>
where
    T: ReadableTable<(&'static str, u64), &'static str>,
{
    let mut rows = Vec::new();
    for entry in table.range((prefix, 0u64)..).map_err(storage_err)? {
        let (key, _) = entry.map_err(storage_err)?;
        let (key, seq) = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        rows.push((key.to_string(), seq));
    }
    Ok(rows)
}

fn next_seq<T>(meta: &T) -> Result<u64, KVError>
where
    T: ReadableTable<&'static str, u64>,
{
    Ok(meta
        .get(NEXT_SEQ)
        .map_err(storage_err)?
        .map(|guard| guard.value())
        .unwrap_or(0))
}

impl Store for RedbStore {
    fn fetch(&self, ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError> {
        ctx.check()?;
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(ENTRIES).map_err(storage_err)?;

        let mut results = KeyValueList::new();
        for entry in table.range((prefix, 0u64)..).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            let (key, _) = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push(KeyValue::new(key, value.value()));
        }
        Ok(results)
    }

    fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut meta = write_txn.open_table(META).map_err(storage_err)?;
            let mut table = write_txn.open_table(ENTRIES).map_err(storage_err)?;

            let mut seq = next_seq(&meta)?;
            for entry in entries {
                table
                    .insert((entry.path.as_str(), seq), entry.value.as_str())
                    .map_err(storage_err)?;
                seq += 1;
            }
            meta.insert(NEXT_SEQ, seq).map_err(storage_err)?;
        }
        Self::finish(ctx, write_txn)?;
        debug!("RedbStore: appended {} entries", entries.len());
        Ok(())
    }

    fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut meta = write_txn.open_table(META).map_err(storage_err)?;
            let mut table = write_txn.open_table(ENTRIES).map_err(storage_err)?;

            let mut seq = next_seq(&meta)?;
            for entry in entries {
                let key = entry.path.as_str();
                let existing: Vec<u64> = {
                    let mut seqs = Vec::new();
                    for row in table.range((key, 0u64)..=(key, u64::MAX)).map_err(storage_err)? {
                        let (row_key, _) = row.map_err(storage_err)?;
                        seqs.push(row_key.value().1);
                    }
                    seqs
                };
                for old in existing {
                    table.remove((key, old)).map_err(storage_err)?;
                }
                table
                    .insert((key, seq), entry.value.as_str())
                    .map_err(storage_err)?;
                seq += 1;
            }
            meta.insert(NEXT_SEQ, seq).map_err(storage_err)?;
        }
        Self::finish(ctx, write_txn)?;
        debug!("RedbStore: upserted {} entries", entries.len());
        Ok(())
    }

    fn delete(&self, ctx: &Context, prefix: &str) -> Result<usize, KVError> {
        ctx.check()?;
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed;
        {
            let mut table = write_txn.open_table(ENTRIES).map_err(storage_err)?;
            // Read and remove inside the same write transaction.
            let rows = matching_rows(&table, prefix)?;
            for (key, seq) in &rows {
                table.remove((key.as_str(), *seq)).map_err(storage_err)?;
            }
            removed = rows.len();
        }
        Self::finish(ctx, write_txn)?;
        debug!("RedbStore: deleted {} records under {:?}", removed, prefix);
        Ok(removed)
    }
}
