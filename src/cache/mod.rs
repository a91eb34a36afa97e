//! Caching subsystem.
//!
//! Two cooperating pieces:
//!
//! - [`key`] — deterministic content-addressed key derivation. Parameter
//!   maps are canonicalized so key order never affects the derived key,
//!   and every key carries the `munin:ai:` namespace so bulk deletion by
//!   prefix is safe.
//!
//! - [`response::ResponseCache`] — get/set/invalidate/clear over a
//!   pluggable [`backend::CacheBackend`]: redis when a distributed store
//!   is configured, a mutex-guarded in-process map otherwise. TTL is a
//!   property of the [`CacheCategory`], set at write time.
//!
//! Backend failures never propagate: a broken cache degrades to "always
//! miss", not an outage.

pub mod backend;
pub mod key;
pub mod response;

pub use backend::{CacheBackend, MemoryBackend, RedisBackend};
pub use key::{derive_key, CacheCategory, KEY_PREFIX};
pub use response::{CacheConfig, ResponseCache};
