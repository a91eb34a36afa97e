//! Telemetry metric name constants.
//!
//! Centralised metric names for munin operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `munin_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `category` — cache or rate-limit category (e.g. "explain", "ai")
//! - `endpoint` — logical endpoint path (e.g. "/api/ai/analyze")
//! - `status` — outcome: "ok" or "error"

/// Total completion requests dispatched through the gateway.
///
/// Labels: `endpoint`.
pub const REQUESTS_TOTAL: &str = "munin_requests_total";

/// Request duration in seconds.
///
/// Labels: `endpoint`.
pub const REQUEST_DURATION_SECONDS: &str = "munin_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `endpoint`.
pub const RETRIES_TOTAL: &str = "munin_retries_total";

/// Total response cache hits.
///
/// Labels: `category`.
pub const CACHE_HITS_TOTAL: &str = "munin_cache_hits_total";

/// Total response cache misses.
///
/// Labels: `category`.
pub const CACHE_MISSES_TOTAL: &str = "munin_cache_misses_total";

/// Total requests rejected by the rate limiter.
///
/// Labels: `category`.
pub const RATE_LIMITED_TOTAL: &str = "munin_rate_limited_total";

/// Total slow (>1s, non-cached) requests flagged by the recorder.
///
/// Labels: `endpoint`.
pub const SLOW_REQUESTS_TOTAL: &str = "munin_slow_requests_total";
