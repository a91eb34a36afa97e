//! Content-addressed cache key derivation.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Fixed namespace every cache key starts with.
///
/// Prefixing exists to make bulk deletion by key pattern safe without
/// touching unrelated data sharing the same store.
pub const KEY_PREFIX: &str = "munin:ai:";

/// Length of the hex hash suffix kept in derived keys.
const HASH_PREFIX_LEN: usize = 16;

/// A named class of cacheable AI operation, each bound to its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheCategory {
    /// Code explanations — stable, cached for 7 days.
    Explain,
    /// Repository analysis — may need updates, cached for 1 day.
    Analyze,
    /// Improvement suggestions — change frequently, cached for 1 hour.
    Suggest,
}

impl CacheCategory {
    /// Category tag as it appears inside cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Explain => "explain",
            CacheCategory::Analyze => "analyze",
            CacheCategory::Suggest => "suggest",
        }
    }

    /// Time-to-live applied to entries written under this category.
    pub fn ttl(&self) -> Duration {
        match self {
            CacheCategory::Explain => Duration::from_secs(7 * 24 * 60 * 60),
            CacheCategory::Analyze => Duration::from_secs(24 * 60 * 60),
            CacheCategory::Suggest => Duration::from_secs(60 * 60),
        }
    }

    /// Logical endpoint path used for performance metrics.
    pub fn endpoint(&self) -> &'static str {
        match self {
            CacheCategory::Explain => "/api/ai/explain",
            CacheCategory::Analyze => "/api/ai/analyze",
            CacheCategory::Suggest => "/api/ai/suggest",
        }
    }
}

impl std::fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a deterministic, content-addressed key for a category and
/// parameter set.
///
/// Parameter map key order is irrelevant: entries are canonicalized into
/// lexicographic order before serialization, so two logically identical
/// requests always resolve to the same key. The canonical JSON is hashed
/// with SHA-256 and truncated to a 16-hex-char prefix.
///
/// Key shape: `munin:ai:{category}:{hash16}`.
pub fn derive_key(category: CacheCategory, params: &serde_json::Map<String, serde_json::Value>) -> String {
    let sorted: BTreeMap<&String, &serde_json::Value> = params.iter().collect();
    // BTreeMap iteration is ordered, and serde_json preserves iteration
    // order when serializing maps.
    let canonical = serde_json::to_string(&sorted).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();

    let mut hash = String::with_capacity(HASH_PREFIX_LEN);
    for byte in digest.iter().take(HASH_PREFIX_LEN / 2) {
        hash.push_str(&format!("{byte:02x}"));
    }

    format!("{KEY_PREFIX}{}:{hash}", category.as_str())
}
