//! SQLite-backed persistent store
//!
//! One row per record with its byte size, so quota checks are a single
//! aggregate query.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::store::Store;
use crate::error::CacheError;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed store with a total byte quota
pub struct SqliteStore {
    conn: Mutex<Connection>,
    quota_bytes: usize,
}

impl SqliteStore {
    /// Open or create the store at the default XDG cache location
    pub fn open(quota_bytes: usize) -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir, quota_bytes)
    }

    /// Get the cache directory path (~/.cache/stockcache on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("stockcache"))
    }

    /// Open the store in a specific directory
    pub fn open_at(cache_dir: &Path, quota_bytes: usize) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path)?;
            return Self::open_at(cache_dir, quota_bytes);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                record_key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                size_bytes INTEGER NOT NULL,
                written_at INTEGER NOT NULL
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            quota_bytes,
        })
    }

    /// Total bytes held across all records
    #[cfg(test)]
    pub fn usage_bytes(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let total: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM records",
            [],
            |r| r.get(0),
        )?;
        Ok(total as usize)
    }

    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

impl Store for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let value = conn
            .query_row(
                "SELECT value FROM records WHERE record_key = ?1",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;

        let used: i64 = conn.query_row(
            "SELECT COALESCE(SUM(size_bytes), 0) FROM records WHERE record_key != ?1",
            [key],
            |r| r.get(0),
        )?;
        let available = self.quota_bytes.saturating_sub(used as usize);
        if value.len() > available {
            return Err(CacheError::QuotaExceeded {
                needed: value.len(),
                available,
            });
        }

        conn.execute(
            "INSERT OR REPLACE INTO records (record_key, value, size_bytes, written_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, value, value.len() as i64, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let deleted = conn.execute("DELETE FROM records WHERE record_key = ?1", [key])?;
        Ok(deleted > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let mut stmt = conn.prepare("SELECT record_key FROM records ORDER BY record_key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
