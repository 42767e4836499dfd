//! SQLite-backed dedup cache.
//! Maps (bucket, user) to the last year-stamped birthday token that was
//! announced for that tier. Entries are only ever inserted or replaced.

use bdbot_core::error::{BdBotError, Result};
use bdbot_core::types::Tier;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

pub struct BirthdayCache {
    conn: Mutex<Connection>,
    manager_bucket: String,
    channel_bucket: String,
}

fn db_err(e: rusqlite::Error) -> BdBotError {
    BdBotError::Cache(e.to_string())
}

impl BirthdayCache {
    /// Open or create the cache database. Both buckets are created if absent;
    /// existing entries are kept.
    pub fn open(path: &Path, manager_bucket: &str, channel_bucket: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn, manager_bucket, channel_bucket)
    }

    /// In-memory cache, mostly for tests.
    pub fn in_memory(manager_bucket: &str, channel_bucket: &str) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, manager_bucket, channel_bucket)
    }

    fn init(conn: Connection, manager_bucket: &str, channel_bucket: &str) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS buckets (
                name TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS birthday_cache (
                bucket TEXT NOT NULL REFERENCES buckets(name),
                user_id TEXT NOT NULL,
                token TEXT NOT NULL,
                PRIMARY KEY (bucket, user_id)
            );",
        )
        .map_err(db_err)?;

        for bucket in [manager_bucket, channel_bucket] {
            conn.execute("INSERT OR IGNORE INTO buckets (name) VALUES (?1)", [bucket])
                .map_err(db_err)?;
        }
        tracing::debug!(manager_bucket, channel_bucket, "birthday cache ready");

        Ok(Self {
            conn: Mutex::new(conn),
            manager_bucket: manager_bucket.to_string(),
            channel_bucket: channel_bucket.to_string(),
        })
    }

    /// Bucket name for a tier.
    pub fn bucket_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Manager => &self.manager_bucket,
            Tier::Channel => &self.channel_bucket,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BdBotError::Cache("cache lock poisoned".into()))
    }

    fn ensure_bucket(conn: &Connection, bucket: &str) -> Result<()> {
        let exists: Option<String> = conn
            .query_row("SELECT name FROM buckets WHERE name = ?1", [bucket], |r| r.get(0))
            .optional()
            .map_err(db_err)?;
        match exists {
            Some(_) => Ok(()),
            None => Err(BdBotError::BucketNotFound(bucket.to_string())),
        }
    }

    /// True only when the stored token for (bucket, user) equals `token`.
    pub fn check_cached(&self, bucket: &str, user_id: &str, token: &str) -> Result<bool> {
        let conn = self.lock()?;
        Self::ensure_bucket(&conn, bucket)?;
        let stored: Option<String> = conn
            .query_row(
                "SELECT token FROM birthday_cache WHERE bucket = ?1 AND user_id = ?2",
                [bucket, user_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(stored.as_deref() == Some(token))
    }

    /// Record `token` as announced for (bucket, user).
    pub fn save(&self, bucket: &str, user_id: &str, token: &str) -> Result<()> {
        let conn = self.lock()?;
        Self::ensure_bucket(&conn, bucket)?;
        conn.execute(
            "INSERT OR REPLACE INTO birthday_cache (bucket, user_id, token) VALUES (?1, ?2, ?3)",
            [bucket, user_id, token],
        )
        .map_err(db_err)?;
        tracing::debug!(bucket, user = user_id, token, "cached notification");
        Ok(())
    }

    /// Number of entries in a bucket.
    pub fn count(&self, bucket: &str) -> Result<usize> {
        let conn = self.lock()?;
        Self::ensure_bucket(&conn, bucket)?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM birthday_cache WHERE bucket = ?1",
                [bucket],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }
}
