//! Sliding-window rate limiting.
//!
//! Admission control per (identifier, category) pair over a rolling time
//! window — a request is only admitted while fewer than the category's
//! quota of requests have been observed in the trailing window, so bursts
//! cannot straddle bucket boundaries the way they can with fixed buckets.
//!
//! Bookkeeping lives behind the [`RateStore`] seam: redis sorted sets with
//! an atomic check-and-record script in production, a mutex-guarded
//! in-process store for development and tests. Infrastructure failures
//! fail open — see [`RateLimiter`].

pub mod limiter;
pub mod store;

pub use limiter::{client_identifier, RateCategory, RateDecision, RateLimiter};
pub use store::{MemoryRateStore, RateStore, RedisRateStore, WindowSample};
