//! Key-value operations on the cache table.
//!
//! [`Cache::get`] and [`Cache::set`] behave like Redis `GET` and `SET ... EX`
//! with an absolute expiration time. Both swallow every internal failure:
//! a broken, missing or locked database reads as a miss and makes writes
//! report `false`. [`Cache::lookup`] and [`Cache::try_set`] expose the cause.
//!
//! Expiration is lazy. A `get` that hits an expired row deletes every expired
//! row in the table before reporting the miss.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite::types::Value;

use super::connection::{OpenMode, Store};
use super::schema;
use crate::Error;
use crate::config::{CacheConfig, DEFAULT_FILENAME};

/// Expiration timestamp of entries that never expire.
pub const NEVER: i64 = 0;

const SELECT_ENTRY: &str = "SELECT key, value, timestamp FROM cache WHERE key = ?1";

const UPSERT_ENTRY: &str = "INSERT INTO cache (key, value, timestamp) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        timestamp = excluded.timestamp";

const SWEEP_EXPIRED: &str = "DELETE FROM cache WHERE timestamp != 0 AND timestamp <= ?1";

/// Current unix time in seconds.
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Absolute expiration timestamp `ttl` from now.
pub fn expires_in(ttl: Duration) -> i64 {
    now().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

/// A stored cache row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    /// Expiration unix timestamp in seconds, [`NEVER`] if the entry does not expire.
    pub timestamp: i64,
}

impl CacheEntry {
    /// Whether the entry is logically absent at `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.timestamp != NEVER && self.timestamp <= now
    }
}

/// Outcome of a read, keeping the failure cause for diagnostics.
#[derive(Debug)]
pub enum Lookup {
    /// A live entry is stored under the key.
    Found(CacheEntry),

    /// No entry, or the entry had expired.
    NotFound,

    /// The database could not be opened or read.
    StorageError(Error),
}

impl Lookup {
    /// Collapse to the two-way outcome seen by `get` callers.
    pub fn into_entry(self) -> Option<CacheEntry> {
        match self {
            Lookup::Found(entry) => Some(entry),
            Lookup::NotFound | Lookup::StorageError(_) => None,
        }
    }
}

/// Row as read from disk, before NULL checks.
type RawRow = (Option<String>, Option<String>, Option<i64>);

fn into_entry(key: &str, row: RawRow) -> Result<CacheEntry, Error> {
    match row {
        (Some(key), Some(value), Some(timestamp)) => Ok(CacheEntry { key, value, timestamp }),
        _ => Err(Error::MalformedRow(key.to_string())),
    }
}

/// Handle to one cache database file.
///
/// Holds only the file location; every call opens and closes its own
/// connection, so a `Cache` is cheap to clone and share.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
    filename: String,
    busy_timeout: Duration,
}

impl Default for Cache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl Cache {
    /// Cache stored in `dir/filename`.
    ///
    /// An empty `filename` falls back to the default file name.
    pub fn new(dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            dir: dir.into(),
            filename: if filename.is_empty() { DEFAULT_FILENAME.to_string() } else { filename },
            busy_timeout: CacheConfig::default().busy_timeout(),
        }
    }

    /// Cache at the location given by the layered configuration.
    pub fn load() -> Result<Self, Error> {
        Ok(Self::from_config(&CacheConfig::load()?))
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self { dir: config.dir.clone(), filename: config.filename.clone(), busy_timeout: config.busy_timeout() }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    /// Open the database in the given mode.
    pub async fn open(&self, mode: OpenMode) -> Result<Store, Error> {
        Store::connect(&self.dir, &self.filename, mode, self.busy_timeout).await
    }

    /// Value stored under `key`, or `None` if absent, expired or unreadable.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_entry(key).await.map(|entry| entry.value)
    }

    /// Full stored record for `key`, including its expiration timestamp.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        self.lookup(key).await.into_entry()
    }

    /// Read `key`, reporting why a read failed.
    ///
    /// Never creates the database file or the schema.
    pub async fn lookup(&self, key: &str) -> Lookup {
        if key.is_empty() {
            return Lookup::NotFound;
        }

        let store = match self.open(OpenMode::Existing).await {
            Ok(store) => store,
            Err(e) => {
                tracing::debug!(key, error = %e, path = %self.db_path().display(), "Cache unavailable");
                return Lookup::StorageError(e);
            }
        };

        let result = read_entry(&store, key).await;
        store.close().await;

        match result {
            Ok(Some(entry)) => Lookup::Found(entry),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                tracing::debug!(key, error = %e, "Cache read failed");
                Lookup::StorageError(e)
            }
        }
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// `expire` is an absolute unix timestamp in seconds; [`NEVER`] keeps the
    /// entry forever. Returns `false` on any failure, in which case a prior
    /// value for `key` is left untouched.
    pub async fn set(&self, key: &str, value: &str, expire: i64) -> bool {
        match self.try_set(key, value, expire).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Like [`Cache::set`], returning the failure cause.
    pub async fn try_set(&self, key: &str, value: &str, expire: i64) -> Result<(), Error> {
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        let store = self.open(OpenMode::Create).await?;
        let result = write_entry(&store, key, value, expire).await;
        store.close().await;
        result
    }
}

async fn read_entry(store: &Store, key: &str) -> Result<Option<CacheEntry>, Error> {
    let row: Option<RawRow> = store
        .select_one(SELECT_ENTRY, vec![Value::from(key.to_string())], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let entry = into_entry(key, row)?;

    let now = now();
    if entry.is_expired_at(now) {
        match sweep_expired(store, now).await {
            Ok(swept) => tracing::debug!(key, swept, "Cache entry expired"),
            Err(e) => tracing::warn!(key, error = %e, "Sweeping expired cache entries failed"),
        }
        return Ok(None);
    }

    Ok(Some(entry))
}

/// Delete every expired row, not just the one that was read.
async fn sweep_expired(store: &Store, now: i64) -> Result<usize, Error> {
    let swept = store.delete(SWEEP_EXPIRED, vec![Value::from(now)]).await?;
    store.commit().await?;
    Ok(swept)
}

async fn write_entry(store: &Store, key: &str, value: &str, expire: i64) -> Result<(), Error> {
    schema::ensure(store).await?;
    store
        .execute(
            UPSERT_ENTRY,
            vec![Value::from(key.to_string()), Value::from(value.to_string()), Value::from(expire)],
        )
        .await?;
    store.commit().await
}
