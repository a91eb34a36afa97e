//! Pluggable cache storage backends.
//!
//! [`CacheBackend`] is the capability seam between the response cache and
//! its storage: [`RedisBackend`] when a distributed store is configured,
//! [`MemoryBackend`] otherwise. The variant is chosen once at startup by
//! the builder; call sites never probe for backend presence.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::time::Instant;
use tracing::debug;

use crate::{MuninError, Result};

/// Entry count past which the in-memory backend sweeps expired entries
/// on write.
const CLEANUP_THRESHOLD: usize = 100;

/// Storage operations the response cache needs.
///
/// Values are opaque serialized strings; TTL handling is the backend's
/// concern (native expiry on redis, an `expires_at` deadline in memory).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Look up a value. Expired entries are reported as absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a time-to-live.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Remove a single entry. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove every entry whose key starts with `prefix`, returning the
    /// number of entries removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64>;

    /// Backend name for logs and diagnostics.
    fn name(&self) -> &'static str;
}

// =============================================================================
// In-process fallback
// =============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Mutex-guarded in-process cache, used when no distributed store is
/// configured. Preserves functional behaviour (minus cross-process
/// sharing) so the rest of the system is agnostic to deployment topology.
///
/// Expired entries are treated as absent and removed lazily on lookup;
/// writes additionally sweep the whole map once it grows past
/// [`CLEANUP_THRESHOLD`] entries, bounding growth between lookups.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: now + ttl,
            },
        );
        if entries.len() > CLEANUP_THRESHOLD {
            let before = entries.len();
            entries.retain(|_, e| !e.is_expired(now));
            let removed = before - entries.len();
            if removed > 0 {
                debug!(removed, "swept expired cache entries");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Distributed backend
// =============================================================================

/// Redis-backed cache storage.
///
/// TTL is delegated to the store (`SET ... EX`), so expiry needs no
/// client-side bookkeeping. Bulk clears enumerate keys with `SCAN` on the
/// namespace pattern and delete the matches.
pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connect to a redis instance at the given URL.
    ///
    /// Uses a connection manager that transparently reconnects; individual
    /// operation failures still surface as [`MuninError::Backend`] for the
    /// response cache to swallow.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| MuninError::Configuration(format!("invalid redis url: {e}")))?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection manager, sharing its pool.
    pub fn with_connection(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        // EX takes whole seconds; round sub-second TTLs up so an entry
        // never outlives its intent by being stored without expiry.
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(&pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: u64 = conn.del(&keys).await?;
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
