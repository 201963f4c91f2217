use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub mod keys;
#[cfg(test)]
pub mod memory;

/// Project and worktree snapshots live for an hour.
pub const CONTEXT_TTL: Duration = Duration::from_secs(3600);

/// Git snapshots are refreshed by the git hooks, so they only need to
/// outlive the gap between two git operations.
pub const GIT_TTL: Duration = Duration::from_secs(30);

/// Upper bound on the connect handshake and on every round trip.
pub const CACHE_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_CACHE_URL: &str = "redis://localhost:6380/0";

#[derive(Debug, Error)]
pub enum CacheError {
    /// The store can't be reached (refused, timed out, dropped).
    #[error("cache connection failed: {0}")]
    Connection(String),
    /// The store answered, but the command failed.
    #[error("cache command failed: {0}")]
    Command(String),
    #[error("encoding cache value: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    /// Connection-class failures latch the cache into no-op mode.
    pub fn is_connection(&self) -> bool {
        matches!(self, CacheError::Connection(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
        {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Command(err.to_string())
        }
    }
}

/// Raw string key-value store with per-entry expiry.
pub trait Store {
    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError>;
    fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Redis-backed store with bounded connect/read/write timeouts.
pub struct RedisStore {
    conn: redis::Connection,
}

impl RedisStore {
    pub fn connect(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)
            .map_err(|e| CacheError::Connection(format!("invalid cache url {url}: {e}")))?;
        let mut conn = client.get_connection_with_timeout(timeout)?;
        conn.set_read_timeout(Some(timeout))?;
        conn.set_write_timeout(Some(timeout))?;
        redis::cmd("PING").query::<String>(&mut conn)?;
        Ok(Self { conn })
    }
}

impl Store for RedisStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(redis::cmd("GET").arg(key).query(&mut self.conn)?)
    }

    fn set_ex(&mut self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        // SETEX rejects a zero expiry.
        let secs = ttl.as_secs().max(1);
        redis::cmd("SETEX")
            .arg(key)
            .arg(secs)
            .arg(value)
            .query::<()>(&mut self.conn)?;
        Ok(())
    }
}

/// JSON-valued cache over a [`Store`] that never fails.
///
/// Every operation degrades to the cache-miss default when the store is
/// unreachable. A failed connect, or a connection-class failure on any
/// later call, switches the instance into no-op mode for the rest of its
/// lifetime; there are no retries.
pub struct TtlCache {
    store: Option<Box<dyn Store>>,
}

impl TtlCache {
    /// Connect to the cache at `url`, falling back to no-op mode.
    pub fn connect(url: &str) -> Self {
        match RedisStore::connect(url, CACHE_TIMEOUT) {
            Ok(store) => Self::with_store(Box::new(store)),
            Err(err) => {
                info!("{err}; continuing without cache");
                Self::unavailable()
            }
        }
    }

    pub fn with_store(store: Box<dyn Store>) -> Self {
        Self { store: Some(store) }
    }

    pub fn unavailable() -> Self {
        Self { store: None }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    /// Read and decode `key`. Misses, corrupt entries and store failures
    /// all come back as `None`.
    pub fn get<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let store = self.store.as_mut()?;
        let raw = match store.get(key) {
            Ok(raw) => raw?,
            Err(err) => {
                self.degrade(key, err);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(key, "ignoring undecodable cache entry: {err}");
                None
            }
        }
    }

    /// Encode `value` as JSON and store it under `key` with expiry `ttl`.
    /// Returns whether the write landed.
    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T, ttl: Duration) -> bool {
        let Some(store) = self.store.as_mut() else {
            return false;
        };
        let result = serde_json::to_string(value)
            .map_err(CacheError::from)
            .and_then(|json| store.set_ex(key, &json, ttl));
        match result {
            Ok(()) => true,
            Err(err) => {
                self.degrade(key, err);
                false
            }
        }
    }

    fn degrade(&mut self, key: &str, err: CacheError) {
        if err.is_connection() {
            info!(key, "{err}; disabling cache for this invocation");
            self.store = None;
        } else {
            debug!(key, "{err}");
        }
    }
}
