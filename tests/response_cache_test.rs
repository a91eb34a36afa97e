//! Response cache behaviour over the in-process backend: TTL expiry,
//! namespace-scoped clearing, and fail-open degradation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use munin::cache::{CacheBackend, CacheCategory, CacheConfig, MemoryBackend, ResponseCache};
use munin::{MuninError, Result};

fn params(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().expect("object literal").clone()
}

fn cache_over(backend: Arc<dyn CacheBackend>) -> ResponseCache {
    ResponseCache::new(backend, CacheConfig::new())
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let cache = cache_over(Arc::new(MemoryBackend::new()));
    let p = params(json!({"code": "fn main() {}"}));

    cache
        .set(CacheCategory::Explain, &p, &"an explanation".to_string())
        .await;

    let hit: Option<String> = cache.get(CacheCategory::Explain, &p).await;
    assert_eq!(hit.as_deref(), Some("an explanation"));
}

#[tokio::test]
async fn different_params_do_not_collide() {
    let cache = cache_over(Arc::new(MemoryBackend::new()));
    let a = params(json!({"code": "a"}));
    let b = params(json!({"code": "b"}));

    cache.set(CacheCategory::Explain, &a, &"for a".to_string()).await;

    let miss: Option<String> = cache.get(CacheCategory::Explain, &b).await;
    assert!(miss.is_none());
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_category_ttl() {
    let cache = ResponseCache::new(
        Arc::new(MemoryBackend::new()),
        CacheConfig::new().ttl_override(Duration::from_secs(60)),
    );
    let p = params(json!({"repo": "octo/site"}));

    cache
        .set(CacheCategory::Analyze, &p, &"analysis".to_string())
        .await;

    tokio::time::advance(Duration::from_secs(59)).await;
    let still: Option<String> = cache.get(CacheCategory::Analyze, &p).await;
    assert!(still.is_some());

    tokio::time::advance(Duration::from_secs(2)).await;
    let gone: Option<String> = cache.get(CacheCategory::Analyze, &p).await;
    assert!(gone.is_none());
}

#[tokio::test]
async fn invalidate_removes_only_the_target_entry() {
    let cache = cache_over(Arc::new(MemoryBackend::new()));
    let a = params(json!({"code": "a"}));
    let b = params(json!({"code": "b"}));

    cache.set(CacheCategory::Suggest, &a, &"sa".to_string()).await;
    cache.set(CacheCategory::Suggest, &b, &"sb".to_string()).await;

    cache.invalidate(CacheCategory::Suggest, &a).await;

    let gone: Option<String> = cache.get(CacheCategory::Suggest, &a).await;
    let kept: Option<String> = cache.get(CacheCategory::Suggest, &b).await;
    assert!(gone.is_none());
    assert_eq!(kept.as_deref(), Some("sb"));
}

#[tokio::test]
async fn clear_all_leaves_foreign_keys_alone() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = cache_over(backend.clone());
    let p = params(json!({"x": 1}));

    cache.set(CacheCategory::Explain, &p, &"v".to_string()).await;
    backend
        .set(
            "session:abc123",
            "unrelated".to_string(),
            Duration::from_secs(3600),
        )
        .await
        .unwrap();

    cache.clear_all().await;

    let gone: Option<String> = cache.get(CacheCategory::Explain, &p).await;
    assert!(gone.is_none());
    let kept = backend.get("session:abc123").await.unwrap();
    assert_eq!(kept.as_deref(), Some("unrelated"));
}

struct BrokenBackend;

#[async_trait]
impl CacheBackend for BrokenBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(MuninError::Backend("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        Err(MuninError::Backend("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool> {
        Err(MuninError::Backend("connection refused".into()))
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64> {
        Err(MuninError::Backend("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn backend_failures_degrade_to_misses() {
    let cache = cache_over(Arc::new(BrokenBackend));
    let p = params(json!({"code": "x"}));

    // None of these may panic or surface an error.
    cache.set(CacheCategory::Explain, &p, &"v".to_string()).await;
    let miss: Option<String> = cache.get(CacheCategory::Explain, &p).await;
    assert!(miss.is_none());
    cache.invalidate(CacheCategory::Explain, &p).await;
    cache.clear_all().await;
}

#[tokio::test]
async fn corrupt_payload_reads_as_miss() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = cache_over(backend.clone());
    let p = params(json!({"k": "v"}));

    // Poison the exact key the cache would read.
    let key = munin::cache::derive_key(CacheCategory::Explain, &p);
    backend
        .set(&key, "{not json".to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    let miss: Option<String> = cache.get(CacheCategory::Explain, &p).await;
    assert!(miss.is_none());
}
