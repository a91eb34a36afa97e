//! Gateway orchestration: admission, caching, provider dispatch,
//! performance recording.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheCategory, ResponseCache};
use crate::limit::{RateCategory, RateDecision, RateLimiter};
use crate::perf::{DiagnosticsReport, PerformanceMetric, PerformanceRecorder};
use crate::telemetry;
use crate::traits::CompletionProvider;
use crate::{MuninError, Result};

/// A completion served by the gateway, with its serving metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    /// Whether the response was served from cache instead of the
    /// provider.
    pub cached: bool,
}

/// Resilience front for an AI completion provider.
///
/// Every request runs the same pipeline: rate-limit admission, cache
/// lookup, provider dispatch on a miss, cache write-back, and a
/// performance metric either way. The provider is only invoked for
/// admitted cache misses.
///
/// Cheap to share: wrap in an [`Arc`] and clone the handle.
pub struct AiGateway {
    pub(crate) provider: Arc<dyn CompletionProvider>,
    pub(crate) cache: ResponseCache,
    pub(crate) limiter: RateLimiter,
    pub(crate) perf: Arc<PerformanceRecorder>,
}

impl std::fmt::Debug for AiGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiGateway").finish_non_exhaustive()
    }
}

impl AiGateway {
    /// Serve one completion request.
    ///
    /// # Errors
    ///
    /// [`MuninError::RateLimited`] when the identifier's quota for the
    /// AI category is exhausted; provider errors pass through unchanged.
    /// Cache and limiter infrastructure failures never surface here.
    pub async fn complete(
        &self,
        identifier: &str,
        category: CacheCategory,
        params: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Completion> {
        let started = Instant::now();
        let endpoint = category.endpoint();
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "endpoint" => endpoint)
        .increment(1);

        let decision = self.limiter.admit(identifier, RateCategory::Ai).await;
        if !decision.allowed {
            return Err(MuninError::RateLimited {
                retry_after: Some(Duration::from_secs(decision.retry_after_secs())),
            });
        }

        if let Some(text) = self.cache.get::<String>(category, params).await {
            self.record(endpoint, started, true, 200);
            return Ok(Completion { text, cached: true });
        }

        let result = self.provider.complete(&serde_json::Value::Object(params.clone())).await;
        match result {
            Ok(text) => {
                self.cache.set(category, params, &text).await;
                self.record(endpoint, started, false, 200);
                Ok(Completion {
                    text,
                    cached: false,
                })
            }
            Err(e) => {
                let status = match &e {
                    MuninError::Api { status, .. } => *status,
                    _ => 500,
                };
                self.record(endpoint, started, false, status);
                Err(e)
            }
        }
    }

    /// Admission check without serving anything; for callers gating
    /// non-AI traffic classes through the same limiter.
    pub async fn admit(&self, identifier: &str, category: RateCategory) -> RateDecision {
        self.limiter.admit(identifier, category).await
    }

    /// Drop the cached response for one category and parameter set.
    pub async fn invalidate(
        &self,
        category: CacheCategory,
        params: &serde_json::Map<String, serde_json::Value>,
    ) {
        self.cache.invalidate(category, params).await;
    }

    /// Drop every cached response.
    pub async fn clear_cache(&self) {
        self.cache.clear_all().await;
    }

    /// Read-only diagnostics snapshot.
    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.perf.report()
    }

    /// The response cache in front of the provider.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The admission limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The performance recorder, shared with the rest of the process.
    pub fn performance(&self) -> Arc<PerformanceRecorder> {
        Arc::clone(&self.perf)
    }

    fn record(&self, endpoint: &str, started: Instant, cache_hit: bool, status_code: u16) {
        let duration_ms = started.elapsed().as_millis() as u64;
        debug!(endpoint, duration_ms, cache_hit, "request completed");
        self.perf.record(PerformanceMetric {
            endpoint: endpoint.to_string(),
            duration_ms,
            cache_hit,
            status_code,
            observed_at: Utc::now(),
        });
    }
}
