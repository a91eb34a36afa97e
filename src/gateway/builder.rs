//! Gateway construction.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::{CacheBackend, CacheConfig, MemoryBackend, RedisBackend, ResponseCache};
use crate::limit::{RateLimiter, RateStore, RedisRateStore};
use crate::perf::PerformanceRecorder;
use crate::traits::CompletionProvider;
use crate::{MuninError, Result};

use super::service::AiGateway;

/// Environment variable consulted for the redis URL when none is set
/// explicitly.
pub const REDIS_URL_ENV: &str = "MUNIN_REDIS_URL";

/// Builder for [`AiGateway`].
///
/// The storage topology is decided exactly once here: a redis URL (set
/// explicitly or via `MUNIN_REDIS_URL`) selects the distributed backend
/// for both the response cache and the rate limiter, sharing one
/// connection; without one, the cache falls back to an in-process map
/// and the limiter is disabled.
///
/// ```rust,no_run
/// # use munin::{Munin, CompletionProvider, Result};
/// # use std::sync::Arc;
/// # async fn build(provider: Arc<dyn CompletionProvider>) -> Result<()> {
/// let gateway = Munin::builder()
///     .provider(provider)
///     .redis_url("redis://127.0.0.1/")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MuninBuilder {
    provider: Option<Arc<dyn CompletionProvider>>,
    redis_url: Option<String>,
    cache_backend: Option<Arc<dyn CacheBackend>>,
    rate_store: Option<Arc<dyn RateStore>>,
    ttl_override: Option<Duration>,
    perf: Option<Arc<PerformanceRecorder>>,
}

impl MuninBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The completion provider the gateway fronts. Required.
    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Redis URL for the distributed cache and rate-limit store.
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }

    /// Inject a cache backend directly, bypassing topology selection.
    pub fn cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Inject a rate-limit store directly, bypassing topology selection.
    pub fn rate_store(mut self, store: Arc<dyn RateStore>) -> Self {
        self.rate_store = Some(store);
        self
    }

    /// Force a single cache TTL for every category.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_override = Some(ttl);
        self
    }

    /// Share an existing performance recorder instead of creating one.
    pub fn performance(mut self, perf: Arc<PerformanceRecorder>) -> Self {
        self.perf = Some(perf);
        self
    }

    /// Build the gateway.
    ///
    /// # Errors
    ///
    /// [`MuninError::NoProvider`] when no provider was set;
    /// [`MuninError::Configuration`] or [`MuninError::Backend`] when a
    /// configured redis URL cannot be connected. An absent redis URL is
    /// not an error.
    pub async fn build(self) -> Result<AiGateway> {
        let provider = self.provider.ok_or(MuninError::NoProvider)?;

        let redis_url = self
            .redis_url
            .or_else(|| std::env::var(REDIS_URL_ENV).ok());

        let (backend, store): (Arc<dyn CacheBackend>, Option<Arc<dyn RateStore>>) =
            match (self.cache_backend, self.rate_store) {
                (Some(backend), store) => (backend, store),
                (None, store) => match &redis_url {
                    Some(url) => {
                        let client = redis::Client::open(url.as_str()).map_err(|e| {
                            MuninError::Configuration(format!("invalid redis url: {e}"))
                        })?;
                        let conn = redis::aio::ConnectionManager::new(client).await?;
                        debug!("redis configured for cache and rate limiting");
                        let backend: Arc<dyn CacheBackend> =
                            Arc::new(RedisBackend::with_connection(conn.clone()));
                        let store = store.or_else(|| {
                            Some(Arc::new(RedisRateStore::with_connection(conn))
                                as Arc<dyn RateStore>)
                        });
                        (backend, store)
                    }
                    None => {
                        debug!("no redis configured, using in-process cache");
                        (Arc::new(MemoryBackend::new()), store)
                    }
                },
            };

        let mut cache_config = CacheConfig::new();
        if let Some(ttl) = self.ttl_override {
            cache_config = cache_config.ttl_override(ttl);
        }

        let limiter = match store {
            Some(store) => RateLimiter::new(store),
            None => RateLimiter::disabled(),
        };

        Ok(AiGateway {
            provider,
            cache: ResponseCache::new(backend, cache_config),
            limiter,
            perf: self.perf.unwrap_or_default(),
        })
    }
}
