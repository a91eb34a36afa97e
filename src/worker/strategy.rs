//! Per-request caching strategy selection.

use url::Url;

use super::caches::CacheKind;

/// Path extensions treated as static assets.
const STATIC_EXTENSIONS: &[&str] = &[
    ".js", ".css", ".png", ".jpg", ".jpeg", ".svg", ".woff", ".woff2", ".ttf", ".ico",
];

/// An intercepted outbound request, reduced to what strategy selection
/// and cache keying need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute request URL.
    pub url: String,
    /// The request's `Accept` header, when present.
    pub accept: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            accept: None,
        }
    }

    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    fn wants_html(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|a| a.contains("text/html"))
    }
}

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Try the network; fall back to the named cache, then to a
    /// synthesized offline response (with the offline page for HTML).
    NetworkFirst(CacheKind),
    /// Serve from the named cache; fetch and populate only on a miss.
    CacheFirst(CacheKind),
    /// Cross-origin: never intercepted, forwarded untouched.
    Passthrough,
}

/// Select the strategy for one request, evaluated per interception.
pub fn classify(request: &FetchRequest, origin: &str, api_prefix: &str) -> Strategy {
    let Ok(url) = Url::parse(&request.url) else {
        return Strategy::Passthrough;
    };
    if url.origin().ascii_serialization() != origin {
        return Strategy::Passthrough;
    }

    let path = url.path();
    if path.starts_with(api_prefix) {
        return Strategy::NetworkFirst(CacheKind::Api);
    }
    if STATIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return Strategy::CacheFirst(CacheKind::Static);
    }
    if request.wants_html() {
        return Strategy::NetworkFirst(CacheKind::Runtime);
    }
    Strategy::CacheFirst(CacheKind::Runtime)
}
