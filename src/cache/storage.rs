//! SQLite-based durable cache storage
//!
//! Partitions survive process restarts; nothing else about a worker does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::key::RequestKey;
use super::store::{CacheStore, PartitionStats, Result, StoredEntry};
use crate::error::CacheError;
use crate::worker::response::CachedResponse;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 2;

/// SQLite-backed partition storage
///
/// The connection is wrapped in a Mutex; each statement is atomic per entry.
pub struct CacheStorage {
    conn: Mutex<Connection>,
}

impl CacheStorage {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/swcache on Linux/macOS)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("swcache"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
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
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS partitions (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL,
                fingerprint TEXT
            );

            CREATE TABLE IF NOT EXISTS entries (
                partition_name TEXT NOT NULL REFERENCES partitions(name) ON DELETE CASCADE,
                cache_key TEXT NOT NULL,
                method TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                headers TEXT NOT NULL,
                body BLOB NOT NULL,
                stored_at INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (partition_name, cache_key)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_key ON entries(cache_key);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Delete every partition
    pub fn clear_all(&self) -> Result<ClearStats> {
        let conn = self.lock()?;
        let partitions: i64 = conn.query_row("SELECT COUNT(*) FROM partitions", [], |r| r.get(0))?;
        let entries = conn.execute("DELETE FROM entries", [])?;
        conn.execute("DELETE FROM partitions", [])?;

        Ok(ClearStats {
            partitions_removed: partitions as usize,
            entries_removed: entries,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Io("cache connection lock poisoned".to_string()))
    }

    fn ensure_partition(conn: &Connection, partition: &str) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO partitions (name, created_at) VALUES (?1, ?2)",
            params![partition, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Nuke the cache database
    fn nuke(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for CacheStorage {
    async fn open(&self, partition: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_partition(&conn, partition)
    }

    async fn partitions(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY created_at, rowid")?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM entries WHERE partition_name = ?1", [partition])?;
        let deleted = conn.execute("DELETE FROM partitions WHERE name = ?1", [partition])?;
        Ok(deleted > 0)
    }

    async fn get(&self, partition: &str, key: &RequestKey) -> Result<Option<StoredEntry>> {
        let conn = self.lock()?;
        let row: Option<(u16, String, Vec<u8>, i64)> = conn
            .query_row(
                "SELECT status, headers, body, stored_at FROM entries
                 WHERE partition_name = ?1 AND cache_key = ?2",
                params![partition, key.digest()],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;

        let Some((status, headers, body, stored_at)) = row else {
            return Ok(None);
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Corrupt(format!("{}: {}", key, e)))?;
        let stored_at = DateTime::from_timestamp_millis(stored_at)
            .ok_or_else(|| CacheError::Corrupt(format!("{}: bad timestamp", key)))?;

        Ok(Some(StoredEntry {
            response: CachedResponse {
                status,
                headers,
                body,
            },
            stored_at,
        }))
    }

    async fn put_at(
        &self,
        partition: &str,
        key: &RequestKey,
        response: &CachedResponse,
        stored_at: DateTime<Utc>,
    ) -> Result<()> {
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        let conn = self.lock()?;
        Self::ensure_partition(&conn, partition)?;
        conn.execute(
            "INSERT OR REPLACE INTO entries
             (partition_name, cache_key, method, url, status, headers, body, stored_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                partition,
                key.digest(),
                key.method,
                key.url,
                response.status,
                headers,
                response.body,
                stored_at.timestamp_millis(),
                response.body.len()
            ],
        )?;
        Ok(())
    }

    async fn delete(&self, partition: &str, key: &RequestKey) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM entries WHERE partition_name = ?1 AND cache_key = ?2",
            params![partition, key.digest()],
        )?;
        Ok(deleted > 0)
    }

    async fn keys(&self, partition: &str) -> Result<Vec<RequestKey>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT method, url FROM entries WHERE partition_name = ?1 ORDER BY url")?;
        let keys = stmt
            .query_map([partition], |r| {
                Ok(RequestKey::new(r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    async fn stats(&self) -> Result<Vec<PartitionStats>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT p.name, COUNT(e.cache_key), COALESCE(SUM(e.size_bytes), 0)
             FROM partitions p LEFT JOIN entries e ON e.partition_name = p.name
             GROUP BY p.name
             ORDER BY p.created_at, p.rowid",
        )?;
        let stats = stmt
            .query_map([], |r| {
                Ok(PartitionStats {
                    name: r.get(0)?,
                    entries: r.get::<_, i64>(1)? as usize,
                    size_bytes: r.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }

    async fn fingerprint(&self, partition: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let fingerprint: Option<Option<String>> = conn
            .query_row(
                "SELECT fingerprint FROM partitions WHERE name = ?1",
                [partition],
                |r| r.get(0),
            )
            .optional()?;
        Ok(fingerprint.flatten())
    }

    async fn set_fingerprint(&self, partition: &str, fingerprint: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_partition(&conn, partition)?;
        conn.execute(
            "UPDATE partitions SET fingerprint = ?2 WHERE name = ?1",
            params![partition, fingerprint],
        )?;
        Ok(())
    }
}

/// Statistics about cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub partitions_removed: usize,
    pub entries_removed: usize,
}
