//! Tiered response cache for expensive AI completions.
//!
//! [`ResponseCache`] sits in front of the completion provider: identical
//! requests (same category, same canonicalized parameters) are served from
//! the cache instead of re-invoking the provider. Storage goes through the
//! [`CacheBackend`] seam — redis when configured, an in-process map
//! otherwise — with TTL bound to the category, not the entry.
//!
//! # Failure policy
//!
//! Caching is an optimization, never a correctness dependency. Every
//! backend failure (store unreachable, serialization error) is caught
//! here, logged, and reported as a miss or no-op; callers never see it.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::backend::CacheBackend;
use super::key::{derive_key, CacheCategory, KEY_PREFIX};
use crate::telemetry;

/// Configuration for the response cache.
///
/// TTLs default to the per-category durations from
/// [`CacheCategory::ttl()`]; overrides apply uniformly to all categories
/// (useful in tests).
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// Override the per-category TTL with a single fixed duration.
    pub ttl_override: Option<Duration>,
}

impl CacheConfig {
    /// Create a new config with per-category defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a single TTL for every category.
    pub fn ttl_override(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }
}

/// Content-addressed response cache over a pluggable backend.
pub struct ResponseCache {
    backend: Arc<dyn CacheBackend>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Create a cache over the given backend.
    pub fn new(backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self { backend, config }
    }

    fn ttl_for(&self, category: CacheCategory) -> Duration {
        self.config.ttl_override.unwrap_or_else(|| category.ttl())
    }

    /// Look up a cached response.
    ///
    /// Returns `None` on miss, on expired entry, on backend failure, and
    /// on a payload that no longer deserializes. Emits hit/miss metrics.
    pub async fn get<T: DeserializeOwned>(
        &self,
        category: CacheCategory,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Option<T> {
        let key = derive_key(category, params);
        match self.backend.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL,
                        "category" => category.as_str())
                    .increment(1);
                    debug!(%category, key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(%category, key, error = %e, "cached payload failed to deserialize");
                    None
                }
            },
            Ok(None) => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL,
                    "category" => category.as_str())
                .increment(1);
                debug!(%category, key, "cache miss");
                None
            }
            Err(e) => {
                warn!(%category, key, error = %e, "cache get failed, treating as miss");
                None
            }
        }
    }

    /// Store a response under the category's TTL.
    ///
    /// Backend and serialization failures are logged and dropped.
    pub async fn set<T: Serialize>(
        &self,
        category: CacheCategory,
        params: &serde_json::Map<String, serde_json::Value>,
        value: &T,
    ) {
        let key = derive_key(category, params);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%category, key, error = %e, "response failed to serialize, not caching");
                return;
            }
        };
        let ttl = self.ttl_for(category);
        match self.backend.set(&key, raw, ttl).await {
            Ok(()) => debug!(%category, key, ttl_secs = ttl.as_secs(), "cache set"),
            Err(e) => warn!(%category, key, error = %e, "cache set failed"),
        }
    }

    /// Remove the single entry for a category and parameter set.
    pub async fn invalidate(
        &self,
        category: CacheCategory,
        params: &serde_json::Map<String, serde_json::Value>,
    ) {
        let key = derive_key(category, params);
        match self.backend.delete(&key).await {
            Ok(removed) => debug!(%category, key, removed, "cache invalidate"),
            Err(e) => warn!(%category, key, error = %e, "cache invalidate failed"),
        }
    }

    /// Remove every entry under the munin key namespace.
    ///
    /// Safe against unrelated data sharing the store: only keys carrying
    /// the [`KEY_PREFIX`] namespace are enumerated and deleted.
    pub async fn clear_all(&self) {
        match self.backend.delete_prefix(KEY_PREFIX).await {
            Ok(removed) => debug!(removed, "cache cleared"),
            Err(e) => warn!(error = %e, "cache clear failed"),
        }
    }

    /// Backend name for diagnostics ("redis" or "memory").
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}
