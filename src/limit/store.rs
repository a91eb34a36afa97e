//! Sliding-window bookkeeping stores.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::Result;

/// One admission check against the rolling window.
#[derive(Debug, Clone, Copy)]
pub struct WindowSample {
    /// Admitted requests observed in the trailing window, not counting
    /// the request being decided.
    pub count: u32,
    /// Time until the oldest counted request leaves the window (i.e.
    /// until one admission slot frees up). Equal to the full window when
    /// the window is empty.
    pub reset_after: Duration,
}

/// Atomic check-and-record for the sliding window.
///
/// Implementations must evaluate the window and record the hit as one
/// serialized step: redis does this with a script, the in-memory store
/// under a mutex. Rejected requests are not recorded — only admitted
/// traffic counts against the window.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Evaluate the window for `key`, recording a hit if `count < limit`.
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<WindowSample>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Mutex-guarded per-key timestamp lists. Single-process only; suitable
/// for development and tests.
#[derive(Default)]
pub struct MemoryRateStore {
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl MemoryRateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<WindowSample> {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let hits = windows.entry(key.to_string()).or_default();

        // Rolling, not fixed-bucket: drop everything older than the window
        // at evaluation time.
        while hits.front().is_some_and(|&t| now.duration_since(t) >= window) {
            hits.pop_front();
        }

        let count = hits.len() as u32;
        if count < limit {
            hits.push_back(now);
        }
        let reset_after = hits
            .front()
            .map(|&oldest| window.saturating_sub(now.duration_since(oldest)))
            .unwrap_or(window);

        Ok(WindowSample { count, reset_after })
    }
}

// =============================================================================
// Redis store
// =============================================================================

/// Lua script executed atomically on the store: prune entries older than
/// the window, count what remains, record the hit only when under the
/// limit, and report when the oldest entry expires. The backend serializes
/// conflicting evaluations, so no client-side locking is needed.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])
redis.call('ZREMRANGEBYSCORE', key, 0, now - window)
local count = redis.call('ZCARD', key)
if count < limit then
  redis.call('ZADD', key, now, ARGV[4])
  redis.call('PEXPIRE', key, window)
end
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
local reset = window
if oldest[2] then
  reset = tonumber(oldest[2]) + window - now
end
return {count, reset}
"#;

/// Redis-backed sliding window over sorted sets, one set per
/// (identifier, category) key, members scored by millisecond timestamp.
pub struct RedisRateStore {
    conn: redis::aio::ConnectionManager,
    script: redis::Script,
}

impl RedisRateStore {
    /// Connect to a redis instance at the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            crate::MuninError::Configuration(format!("invalid redis url: {e}"))
        })?;
        let conn = redis::aio::ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
        })
    }

    /// Reuse an existing connection manager (shared with the cache backend).
    pub fn with_connection(conn: redis::aio::ConnectionManager) -> Self {
        Self {
            conn,
            script: redis::Script::new(SLIDING_WINDOW_SCRIPT),
        }
    }
}

#[async_trait]
impl RateStore for RedisRateStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> Result<WindowSample> {
        let mut conn = self.conn.clone();
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        // Member must be unique per hit; two hits in the same millisecond
        // would otherwise collapse into one sorted-set entry.
        let member = format!("{now_ms}-{:x}", rand_suffix());

        let (count, reset_ms): (u32, u64) = self
            .script
            .key(key)
            .arg(now_ms)
            .arg(window.as_millis() as u64)
            .arg(limit)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        Ok(WindowSample {
            count,
            reset_after: Duration::from_millis(reset_ms),
        })
    }
}

/// Cheap per-call entropy for sorted-set member uniqueness. Not security
/// sensitive; address-of-stack plus a nanosecond counter is enough.
fn rand_suffix() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let stack = 0u8;
    (&stack as *const u8 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ nanos
}
