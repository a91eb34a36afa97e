//! Sliding-window rate limiter with fail-open semantics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::store::RateStore;
use crate::telemetry;

/// A named class of rate-limited traffic, each with a fixed
/// (max requests, window) quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    /// AI endpoints — cost sensitive, 10 requests per minute.
    Ai,
    /// Auth endpoints — brute-force sensitive, 5 requests per minute.
    Auth,
    /// Repository operations — 30 requests per minute.
    Repository,
    /// General API traffic — 60 requests per minute.
    General,
}

impl RateCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateCategory::Ai => "ai",
            RateCategory::Auth => "auth",
            RateCategory::Repository => "repository",
            RateCategory::General => "general",
        }
    }

    /// Maximum admitted requests per window.
    pub fn max_requests(&self) -> u32 {
        match self {
            RateCategory::Ai => 10,
            RateCategory::Auth => 5,
            RateCategory::Repository => 30,
            RateCategory::General => 60,
        }
    }

    /// Rolling window duration.
    pub fn window(&self) -> Duration {
        Duration::from_secs(60)
    }
}

impl std::fmt::Display for RateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one admission check, with the bookkeeping callers attach
/// to every response as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the oldest counted request leaves the window.
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    fn open(category: RateCategory) -> Self {
        Self {
            allowed: true,
            limit: category.max_requests(),
            remaining: category.max_requests(),
            reset_at: Utc::now(),
        }
    }

    /// Whole seconds until the window frees a slot; what a 429 response
    /// reports as `retryAfter`.
    pub fn retry_after_secs(&self) -> u64 {
        (self.reset_at - Utc::now()).num_seconds().max(0) as u64
    }

    /// Header name/value pairs for the outgoing response.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-RateLimit-Limit", self.limit.to_string()),
            ("X-RateLimit-Remaining", self.remaining.to_string()),
            ("X-RateLimit-Reset", self.reset_at.to_rfc3339()),
        ]
    }
}

/// Per-identifier, per-category admission control over a rolling window.
///
/// Built with `Some(store)` for real limiting or `None` to disable the
/// limiter entirely — the system stays fully usable without a configured
/// rate-limit dependency.
///
/// # Failure policy — fail open
///
/// A store error results in an allowed decision with a logged warning:
/// an unreachable limiter must never itself produce an outage.
pub struct RateLimiter {
    store: Option<Arc<dyn RateStore>>,
}

impl RateLimiter {
    /// Limiter backed by a sliding-window store.
    pub fn new(store: Arc<dyn RateStore>) -> Self {
        Self { store: Some(store) }
    }

    /// Limiter with no backing store: every request is admitted.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Whether a backing store is configured.
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Decide admission for one request.
    ///
    /// The request counts against this category's window only; a caller
    /// gating on several categories checks each independently.
    pub async fn admit(&self, identifier: &str, category: RateCategory) -> RateDecision {
        let Some(store) = &self.store else {
            debug!(%category, "rate limiting not configured, skipping");
            return RateDecision::open(category);
        };

        let limit = category.max_requests();
        let key = format!("munin:ratelimit:{}:{identifier}", category.as_str());
        match store.hit(&key, limit, category.window()).await {
            Ok(sample) => {
                let allowed = sample.count < limit;
                // The admitted request itself occupies a slot.
                let used = sample.count + u32::from(allowed);
                let decision = RateDecision {
                    allowed,
                    limit,
                    remaining: limit.saturating_sub(used),
                    reset_at: Utc::now()
                        + chrono::Duration::from_std(sample.reset_after)
                            .unwrap_or_else(|_| chrono::Duration::seconds(60)),
                };
                if !allowed {
                    metrics::counter!(telemetry::RATE_LIMITED_TOTAL,
                        "category" => category.as_str())
                    .increment(1);
                    debug!(%category, identifier, "request rejected by rate limiter");
                }
                decision
            }
            Err(e) => {
                warn!(%category, error = %e, "rate limit store error, failing open");
                RateDecision::open(category)
            }
        }
    }
}

/// Resolve the rate-limit identifier for a request.
///
/// An authenticated principal takes precedence; otherwise the first hop
/// of `X-Forwarded-For`, then `X-Real-IP`, then a fixed placeholder.
pub fn client_identifier(
    principal: Option<&str>,
    forwarded_for: Option<&str>,
    real_ip: Option<&str>,
) -> String {
    if let Some(principal) = principal.filter(|p| !p.is_empty()) {
        return principal.to_string();
    }
    if let Some(forwarded) = forwarded_for {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    real_ip
        .filter(|ip| !ip.is_empty())
        .unwrap_or("unknown")
        .to_string()
}
