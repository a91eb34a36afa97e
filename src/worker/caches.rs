//! Generation-tagged named caches and response-shaped values.

use std::collections::HashMap;

use chrono::Utc;
use tracing::debug;

/// Prefix every named cache carries, ahead of the kind and generation.
const CACHE_PREFIX: &str = "munin";

/// The three cache roles, each versioned independently as
/// `munin-{kind}-v{N}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Pre-cached critical routes and static assets.
    Static,
    /// API responses stored by the network-first strategy.
    Api,
    /// Everything else cached at runtime.
    Runtime,
}

impl CacheKind {
    fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Api => "api",
            CacheKind::Runtime => "runtime",
        }
    }
}

/// Full name of one cache generation, e.g. `munin-api-v2`.
pub fn cache_name(kind: CacheKind, version: u32) -> String {
    format!("{CACHE_PREFIX}-{}-v{version}", kind.as_str())
}

/// A stored HTTP response. Callers always receive one of these from the
/// worker — synthesized when nothing better is available — so page code
/// handles a single shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedHttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedHttpResponse {
    /// Whether the response is cacheable (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Synthesized offline response for API-style requests: a well-formed
    /// 503 JSON payload describing the failure.
    pub fn offline_json() -> Self {
        let body = serde_json::json!({
            "error": "Offline",
            "message": "You are currently offline. This content is not available in cache.",
            "timestamp": Utc::now().to_rfc3339(),
        });
        Self {
            status: 503,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Synthesized offline response for asset-style requests.
    pub fn offline_plain() -> Self {
        Self {
            status: 503,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: b"Offline - unable to fetch resource".to_vec(),
        }
    }
}

/// All cache generations owned by the worker.
///
/// Exactly one generation of each kind is current per worker version;
/// every other generation is stale and deleted on activation. Owned by
/// the worker task alone, so plain maps suffice — concurrent population
/// races for the same URL resolve as last-writer-wins upstream.
pub struct NamedCaches {
    version: u32,
    buckets: HashMap<String, HashMap<String, CachedHttpResponse>>,
}

impl NamedCaches {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            buckets: HashMap::new(),
        }
    }

    /// Look up the response cached for an exact URL in the current
    /// generation of `kind`.
    pub fn lookup(&self, kind: CacheKind, url: &str) -> Option<&CachedHttpResponse> {
        self.buckets.get(&cache_name(kind, self.version))?.get(url)
    }

    /// Store a response in the current generation of `kind`.
    pub fn store(&mut self, kind: CacheKind, url: String, response: CachedHttpResponse) {
        self.buckets
            .entry(cache_name(kind, self.version))
            .or_default()
            .insert(url, response);
    }

    /// Delete every generation whose name does not match the current
    /// version. Returns the deleted cache names.
    pub fn delete_stale_generations(&mut self) -> Vec<String> {
        let current: Vec<String> = [CacheKind::Static, CacheKind::Api, CacheKind::Runtime]
            .into_iter()
            .map(|kind| cache_name(kind, self.version))
            .collect();
        let stale: Vec<String> = self
            .buckets
            .keys()
            .filter(|name| !current.contains(name))
            .cloned()
            .collect();
        for name in &stale {
            self.buckets.remove(name);
            debug!(cache = %name, "deleted stale cache generation");
        }
        stale
    }

    /// Delete every named cache, current generations included.
    pub fn delete_all(&mut self) {
        self.buckets.clear();
    }

    /// Names of all existing cache generations.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.keys().cloned().collect();
        names.sort();
        names
    }

    /// Seed an old generation directly; test support for upgrade
    /// scenarios.
    #[doc(hidden)]
    pub fn seed_generation(&mut self, name: &str, url: String, response: CachedHttpResponse) {
        self.buckets
            .entry(name.to_string())
            .or_default()
            .insert(url, response);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> CachedHttpResponse {
        CachedHttpResponse {
            status: 200,
            headers: vec![],
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn store_and_lookup_in_current_generation() {
        let mut caches = NamedCaches::new(1);
        caches.store(CacheKind::Api, "/api/notes".into(), response("notes"));
        assert!(caches.lookup(CacheKind::Api, "/api/notes").is_some());
        assert!(caches.lookup(CacheKind::Runtime, "/api/notes").is_none());
    }

    #[test]
    fn stale_generations_are_garbage_collected() {
        let mut caches = NamedCaches::new(2);
        caches.seed_generation("munin-static-v1", "/".into(), response("old"));
        caches.store(CacheKind::Static, "/".into(), response("new"));

        let deleted = caches.delete_stale_generations();
        assert_eq!(deleted, vec!["munin-static-v1".to_string()]);
        assert_eq!(
            caches.lookup(CacheKind::Static, "/").map(|r| &r.body[..]),
            Some(&b"new"[..])
        );
    }

    #[test]
    fn generation_names_carry_kind_and_version() {
        assert_eq!(cache_name(CacheKind::Static, 3), "munin-static-v3");
        assert_eq!(cache_name(CacheKind::Api, 1), "munin-api-v1");
        assert_eq!(cache_name(CacheKind::Runtime, 2), "munin-runtime-v2");
    }

    #[test]
    fn offline_json_is_well_formed() {
        let response = CachedHttpResponse::offline_json();
        assert_eq!(response.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "Offline");
    }
}
