use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction, params};
use tracing::{debug, warn};

use pathkv_kv::error::storage_err;
use pathkv_kv::{Context, KVError, KeyValue, KeyValueList, Store};

use crate::config::SqlConfig;

/// SQL text for one records table, rendered once at open time.
struct Statements {
    fetch: String,
    insert: String,
    live_ids: String,
    soft_delete_id: String,
    soft_delete_key: String,
    purge: String,
}

impl Statements {
    fn new(table: &str) -> Self {
        // Prefix match: the range bound lets SQLite use the key index, the
        // substr comparison makes the match exact.
        let matches = r#""key" >= ?1 AND substr("key", 1, length(?1)) = ?1"#;
        Self {
            fetch: format!(
                r#"SELECT "key", "value" FROM {table}
                   WHERE deleted_at IS NULL AND {matches}
                   ORDER BY "key", rowid"#
            ),
            insert: format!(
                r#"INSERT INTO {table} (id, "key", "value", created_at, updated_at)
                   VALUES (?1, ?2, ?3, ?4, ?4)"#
            ),
            live_ids: format!(
                "SELECT id FROM {table} WHERE deleted_at IS NULL AND {matches}"
            ),
            soft_delete_id: format!(
                "UPDATE {table} SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1"
            ),
            soft_delete_key: format!(
                r#"UPDATE {table} SET deleted_at = ?2, updated_at = ?2
                   WHERE "key" = ?1 AND deleted_at IS NULL"#
            ),
            purge: format!("DELETE FROM {table} WHERE deleted_at IS NOT NULL"),
        }
    }
}

fn migrate(conn: &Connection, table: &str) -> Result<(), KVError> {
    conn.execute_batch(&format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
               id TEXT PRIMARY KEY,
               "key" TEXT NOT NULL,
               "value" TEXT NOT NULL,
               created_at TEXT NOT NULL,
               updated_at TEXT NOT NULL,
               deleted_at TEXT
           );
           CREATE INDEX IF NOT EXISTS {table}_key_idx ON {table} ("key");
           CREATE INDEX IF NOT EXISTS {table}_deleted_at_idx ON {table} (deleted_at);"#
    ))
    .map_err(storage_err)
}

/// Generate a new row id (UUIDv4, no dashes).
fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// SqliteStore keeps records in a relational table with audit columns
/// (`id`, `created_at`, `updated_at`, `deleted_at`).
///
/// Deletes are soft: rows get a `deleted_at` timestamp and drop out of every
/// fetch, and [`SqliteStore::purge_deleted`] removes them for good. Each
/// write runs in one SQLite transaction that is rolled back on error or
/// cancellation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    sql: Statements,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path and migrate the
    /// records table.
    pub fn open(path: &Path, config: &SqlConfig) -> Result<Self, KVError> {
        config.validate()?;
        let conn = Connection::open(path).map_err(storage_err)?;

        // Enable WAL mode for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(storage_err)?;

        debug!("SqliteStore: opened {:?}", path);
        Self::with_connection(conn, config)
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory(config: &SqlConfig) -> Result<Self, KVError> {
        config.validate()?;
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: &SqlConfig) -> Result<Self, KVError> {
        let table = config.table();
        migrate(&conn, &table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            sql: Statements::new(&table),
        })
    }

    /// Permanently remove soft-deleted rows. Returns how many were removed.
    pub fn purge_deleted(&self, ctx: &Context) -> Result<usize, KVError> {
        ctx.check()?;
        let conn = self.lock()?;
        ctx.check()?;
        let purged = conn.execute(&self.sql.purge, []).map_err(storage_err)?;
        debug!("SqliteStore: purged {} soft-deleted rows", purged);
        Ok(purged)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, KVError> {
        self.conn
            .lock()
            .map_err(|e| KVError::Storage(e.to_string()))
    }

    /// Commit unless the context gave up while the transaction was open.
    fn finish(ctx: &Context, tx: Transaction<'_>) -> Result<(), KVError> {
        if let Err(e) = ctx.check() {
            tx.rollback().map_err(storage_err)?;
            warn!("SqliteStore: transaction rolled back: {}", e);
            return Err(e);
        }
        tx.commit().map_err(storage_err)
    }
}

impl Store for SqliteStore {
    fn fetch(&self, ctx: &Context, prefix: &str) -> Result<KeyValueList, KVError> {
        ctx.check()?;
        let conn = self.lock()?;
        ctx.check()?;

        let mut stmt = conn.prepare_cached(&self.sql.fetch).map_err(storage_err)?;
        let rows = stmt
            .query_map(params![prefix], |row| {
                Ok(KeyValue::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                ))
            })
            .map_err(storage_err)?;

        let mut results = KeyValueList::new();
        for row in rows {
            results.push(row.map_err(storage_err)?);
        }
        Ok(results)
    }

    fn append(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err)?;
        {
            let now = now_rfc3339();
            let mut insert = tx.prepare_cached(&self.sql.insert).map_err(storage_err)?;
            for entry in entries {
                insert
                    .execute(params![new_id(), entry.path, entry.value, now])
                    .map_err(storage_err)?;
            }
        }
        Self::finish(ctx, tx)?;
        debug!("SqliteStore: appended {} entries", entries.len());
        Ok(())
    }

    fn upsert(&self, ctx: &Context, entries: &KeyValueList) -> Result<(), KVError> {
        ctx.check()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err)?;
        {
            let now = now_rfc3339();
            let mut retire = tx
                .prepare_cached(&self.sql.soft_delete_key)
                .map_err(storage_err)?;
            let mut insert = tx.prepare_cached(&self.sql.insert).map_err(storage_err)?;
            for entry in entries {
                retire
                    .execute(params![entry.path, now])
                    .map_err(storage_err)?;
                insert
                    .execute(params![new_id(), entry.path, entry.value, now])
                    .map_err(storage_err)?;
            }
        }
        Self::finish(ctx, tx)?;
        debug!("SqliteStore: upserted {} entries", entries.len());
        Ok(())
    }

    fn delete(&self, ctx: &Context, prefix: &str) -> Result<usize, KVError> {
        ctx.check()?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err)?;
        let removed;
        {
            // Look the rows up, then mark exactly those rows deleted, inside
            // one transaction.
            let ids: Vec<String> = {
                let mut select = tx.prepare_cached(&self.sql.live_ids).map_err(storage_err)?;
                let rows = select
                    .query_map(params![prefix], |row| row.get::<_, String>(0))
                    .map_err(storage_err)?;
                rows.collect::<Result<Vec<String>, _>>().map_err(storage_err)?
            };

            let now = now_rfc3339();
            let mut mark = tx
                .prepare_cached(&self.sql.soft_delete_id)
                .map_err(storage_err)?;
            for id in &ids {
                mark.execute(params![id, now]).map_err(storage_err)?;
            }
            removed = ids.len();
        }
        Self::finish(ctx, tx)?;
        debug!("SqliteStore: deleted {} records under {:?}", removed, prefix);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathkv_kv::kv;
    use tempfile::TempDir;

    fn ctx() -> Context {
        Context::background()
    }

    fn count(store: &SqliteStore, filter: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM pathkv_key_values WHERE {}", filter),
            [],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn delete_is_soft() {
        let store = SqliteStore::open_in_memory(&SqlConfig::default()).unwrap();
        store
            .append(&ctx(), &kv(&["users/1", "a", "users/2", "b"]).unwrap())
            .unwrap();

        assert_eq!(store.delete(&ctx(), "users/").unwrap(), 2);
        assert!(store.fetch(&ctx(), "users/").unwrap().is_empty());
        assert_eq!(count(&store, "deleted_at IS NOT NULL"), 2);

        assert_eq!(store.purge_deleted(&ctx()).unwrap(), 2);
        assert_eq!(count(&store, "1 = 1"), 0);
    }

    #[test]
    fn rows_carry_audit_columns() {
        let store = SqliteStore::open_in_memory(&SqlConfig::default()).unwrap();
        store.append(&ctx(), &kv(&["k", "v"]).unwrap()).unwrap();

        assert_eq!(
            count(
                &store,
                "length(id) = 32 AND created_at = updated_at AND deleted_at IS NULL"
            ),
            1
        );
    }

    #[test]
    fn upsert_retires_previous_rows() {
        let store = SqliteStore::open_in_memory(&SqlConfig::default()).unwrap();
        store.append(&ctx(), &kv(&["k", "1", "k", "2"]).unwrap()).unwrap();
        store.upsert(&ctx(), &kv(&["k", "3"]).unwrap()).unwrap();

        let got = store.fetch(&ctx(), "k").unwrap();
        assert_eq!(got.into_inner(), vec![KeyValue::new("k", "3")]);
        assert_eq!(count(&store, "deleted_at IS NOT NULL"), 2);
    }

    #[test]
    fn prefix_with_like_metacharacters_is_literal() {
        let store = SqliteStore::open_in_memory(&SqlConfig::default()).unwrap();
        store
            .append(&ctx(), &kv(&["a%b/1", "x", "axb/1", "y", "a_b/1", "z"]).unwrap())
            .unwrap();

        let got = store.fetch(&ctx(), "a%b/").unwrap();
        assert_eq!(got.paths().collect::<Vec<_>>(), vec!["a%b/1"]);
    }

    #[test]
    fn cancelled_append_rolls_back() {
        let store = SqliteStore::open_in_memory(&SqlConfig::default()).unwrap();
        let cancelled = ctx();
        cancelled.cancel();

        assert!(store
            .append(&cancelled, &kv(&["k", "v"]).unwrap())
            .unwrap_err()
            .is_cancellation());
        assert_eq!(count(&store, "1 = 1"), 0);
    }

    #[test]
    fn custom_prefix_and_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.sqlite");
        let config = SqlConfig {
            table_prefix: "tenant_a_".into(),
        };
        {
            let store = SqliteStore::open(&path, &config).unwrap();
            store.append(&ctx(), &kv(&["k", "v"]).unwrap()).unwrap();
        }
        let store = SqliteStore::open(&path, &config).unwrap();
        assert_eq!(store.fetch(&ctx(), "k").unwrap().len(), 1);

        // A different prefix is a different table.
        let other = SqliteStore::open(&path, &SqlConfig::default()).unwrap();
        assert!(other.fetch(&ctx(), "k").unwrap().is_empty());
    }

    #[test]
    fn invalid_prefix_is_rejected_before_opening() {
        let config = SqlConfig {
            table_prefix: "bad-prefix".into(),
        };
        let err = SqliteStore::open_in_memory(&config).err().unwrap();
        assert!(err.is_validation());
    }
}
