//! Durable local key-value store used for cache persistence across sessions.
//!
//! Failures here are never fatal: the cache treats any error as a miss.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LocalStoreError>;
    fn set(&self, key: &str, value: &[u8]) -> Result<(), LocalStoreError>;
    fn remove(&self, key: &str) -> Result<(), LocalStoreError>;
    fn clear(&self) -> Result<(), LocalStoreError>;
}

/// Sqlite-backed store, one `cache_entries` table in a sidecar database
/// under the app data directory.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, LocalStoreError> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join("starlet_cache.db"))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl LocalStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LocalStoreError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), LocalStoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cache_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM cache_entries", [])?;
        Ok(())
    }
}

/// Purely in-memory store. Used in tests and by the CLI demo, where
/// persistence across runs is not wanted.
#[derive(Default)]
pub struct MemoryLocalStore {
    entries: Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LocalStoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), LocalStoreError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), LocalStoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), LocalStoreError> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        store.set("k", b"payload").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"payload".to_vec()));

        store.set("k", b"replaced").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"replaced".to_vec()));

        store.remove("k").unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_sqlite_clear() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();

        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store.clear().unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap(), None);
    }
}
