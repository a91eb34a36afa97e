//! # Munin
//!
//! Resilience and caching layer for AI-assisted applications: a gateway
//! that fronts an expensive completion provider with content-addressed
//! response caching, sliding-window rate limiting, classified retry, and
//! bounded performance recording, plus an offline-first cache worker for
//! clients that must keep working without a network.
//!
//! The load-bearing principle throughout is graceful degradation: every
//! supporting subsystem (cache, limiter, offline worker) fails open, so
//! infrastructure trouble degrades performance, never availability.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use munin::{CacheCategory, CompletionProvider, Munin, Result};
//!
//! # struct MyProvider;
//! # #[async_trait::async_trait]
//! # impl CompletionProvider for MyProvider {
//! #     async fn complete(&self, _params: &serde_json::Value) -> Result<String> {
//! #         Ok(String::new())
//! #     }
//! # }
//! # async fn run() -> Result<()> {
//! let gateway = Munin::builder()
//!     .provider(Arc::new(MyProvider))
//!     .redis_url("redis://127.0.0.1/")
//!     .build()
//!     .await?;
//!
//! let mut params = serde_json::Map::new();
//! params.insert("code".into(), "fn main() {}".into());
//!
//! let completion = gateway
//!     .complete("user-42", CacheCategory::Explain, &params)
//!     .await?;
//! println!("cached: {}, {}", completion.cached, completion.text);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`cache`] — content-addressed response cache over redis or an
//!   in-process map
//! - [`limit`] — per-identifier sliding-window rate limiting, fail open
//! - [`client`] — HTTP client with classified exponential-backoff retry
//! - [`perf`] — fixed-capacity performance metric recording
//! - [`worker`] — offline-first cache worker with generation-tagged
//!   named caches
//! - [`gateway`] — the facade tying admission, caching, and dispatch
//!   together

pub mod cache;
pub mod client;
pub mod error;
pub mod gateway;
pub mod limit;
pub mod perf;
pub mod telemetry;
pub mod traits;
pub mod worker;

pub use cache::{CacheCategory, ResponseCache};
pub use client::{ApiClient, RequestOptions};
pub use error::{MuninError, Result};
pub use gateway::{AiGateway, Completion, Munin, MuninBuilder};
pub use limit::{client_identifier, RateCategory, RateDecision, RateLimiter};
pub use perf::{DiagnosticsReport, PerformanceRecorder};
pub use traits::CompletionProvider;
pub use worker::{ControlMessage, OfflineCacheWorker, WorkerConfig, WorkerHandle, WorkerState};
