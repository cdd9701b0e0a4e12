use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::release::error::CacheError;
use crate::release::types::{CacheKey, Snapshot};

/// Trait for persisting release snapshots
#[cfg_attr(test, automock)]
pub trait CacheStore: Send + Sync {
    /// Get the cached snapshot for a repository
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, CacheError>;

    /// Replace the cached snapshot for a repository
    fn put(&self, key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError>;

    /// Delete the cached snapshot, returning whether one existed
    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// List every cached repository
    fn list(&self) -> Result<Vec<CacheEntry>, CacheError>;
}

/// Summary row of a cached snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub last_updated: DateTime<Utc>,
    pub release_count: usize,
}

/// SQLite-backed snapshot cache
pub struct Cache {
    conn: Mutex<Connection>,
}

impl Cache {
    pub fn new(db_path: &Path) -> Result<Self, CacheError> {
        info!("Initializing cache database at {:?}", db_path);

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.create_schema()?;

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;

        // Empty namespace stands for "no namespace" so the UNIQUE constraint holds
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner TEXT NOT NULL,
                repo TEXT NOT NULL,
                namespace TEXT NOT NULL DEFAULT '',
                last_updated INTEGER NOT NULL,
                release_count INTEGER NOT NULL,
                data TEXT NOT NULL,
                UNIQUE(owner, repo, namespace)
            )
            "#,
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }
}

fn namespace_column(key: &CacheKey) -> &str {
    key.namespace.as_deref().unwrap_or("")
}

impl CacheStore for Cache {
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, CacheError> {
        let conn = self.lock_conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM snapshots WHERE owner = ?1 AND repo = ?2 AND namespace = ?3",
                (&key.owner, &key.repo, namespace_column(key)),
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError> {
        debug!(
            "Saving snapshot with {} releases for {}",
            snapshot.release_count, key
        );
        let data = serde_json::to_string(snapshot)?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO snapshots (owner, repo, namespace, last_updated, release_count, data)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(owner, repo, namespace) DO UPDATE SET
                last_updated = excluded.last_updated,
                release_count = excluded.release_count,
                data = excluded.data
            "#,
            (
                &key.owner,
                &key.repo,
                namespace_column(key),
                snapshot.last_updated.timestamp_millis(),
                snapshot.release_count as i64,
                &data,
            ),
        )?;
        tx.commit()?;

        Ok(())
    }

    fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "DELETE FROM snapshots WHERE owner = ?1 AND repo = ?2 AND namespace = ?3",
            (&key.owner, &key.repo, namespace_column(key)),
        )?;

        Ok(rows > 0)
    }

    fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT owner, repo, namespace, last_updated, release_count
            FROM snapshots
            ORDER BY owner, repo, namespace
            "#,
        )?;

        let entries = stmt
            .query_map([], |row| {
                let owner: String = row.get(0)?;
                let repo: String = row.get(1)?;
                let namespace: String = row.get(2)?;
                let last_updated: i64 = row.get(3)?;
                let release_count: i64 = row.get(4)?;
                Ok((owner, repo, namespace, last_updated, release_count))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(owner, repo, namespace, last_updated, release_count)| {
                let mut key = CacheKey::new(owner, repo);
                if !namespace.is_empty() {
                    key = key.with_namespace(namespace);
                }
                CacheEntry {
                    key,
                    last_updated: DateTime::from_timestamp_millis(last_updated)
                        .unwrap_or_default(),
                    release_count: release_count.max(0) as usize,
                }
            })
            .collect();

        Ok(entries)
    }
}
