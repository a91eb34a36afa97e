//! Offline-first network interception worker.
//!
//! A single logical thread — a dedicated tokio task owning all cache
//! state — intercepts every outbound request the client issues and serves
//! it through a caching strategy selected by resource class (see
//! [`strategy`]). Requests reach the task over an event queue; the
//! lifecycle itself is a pure state machine ([`state`]) whose transitions
//! return the cache side effects to perform.
//!
//! Nothing outside the worker writes to its caches: the only external
//! mutation entry points are the [`ControlMessage`] protocol
//! (`SKIP_WAITING`, `CACHE_URLS`, `CLEAR_CACHE`).
//!
//! A fetch that fails with no usable cache fallback at any layer resolves
//! to a synthesized offline response — callers always receive a
//! response-shaped value, never an error.

pub mod caches;
pub mod state;
pub mod strategy;

pub use caches::{cache_name, CacheKind, CachedHttpResponse, NamedCaches};
pub use state::{transition, CacheAction, ControlMessage, WorkerEvent, WorkerState};
pub use strategy::{classify, FetchRequest, Strategy};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{MuninError, Result};

/// Network access seam. Production uses [`HttpFetcher`]; tests script
/// responses and failures without a transport.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedHttpResponse>;
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    http: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedHttpResponse> {
        let mut builder = self.http.get(&request.url);
        if let Some(accept) = &request.accept {
            builder = builder.header(reqwest::header::ACCEPT, accept);
        }
        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(CachedHttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Generation tag; bump to invalidate all previous cache generations
    /// on next activation.
    pub version: u32,
    /// Serialized origin the worker is scoped to, e.g.
    /// `https://app.example.com`. Requests to any other origin pass
    /// through untouched.
    pub origin: String,
    /// Path prefix routed through the network-first API strategy.
    pub api_prefix: String,
    /// Critical routes pre-populated into the static cache on install.
    pub precache_routes: Vec<String>,
    /// Path of the fallback page served for HTML requests when both
    /// network and cache fail. Must be part of `precache_routes` to be
    /// available offline.
    pub offline_page: String,
    /// Activate immediately after the first install instead of waiting
    /// for an explicit `SKIP_WAITING`.
    pub auto_activate: bool,
}

impl WorkerConfig {
    /// Configuration with the default critical-route set.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            version: 1,
            origin: origin.into(),
            api_prefix: "/api/".to_string(),
            precache_routes: [
                "/",
                "/dashboard",
                "/login",
                "/register",
                "/search",
                "/viewer",
                "/learning-path",
                "/settings",
                "/chat",
                "/notifications",
                "/offline.html",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            offline_page: "/offline.html".to_string(),
            auto_activate: true,
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn precache_routes(mut self, routes: Vec<String>) -> Self {
        self.precache_routes = routes;
        self
    }

    pub fn auto_activate(mut self, auto: bool) -> Self {
        self.auto_activate = auto;
        self
    }
}

enum WorkerCommand {
    Fetch(FetchRequest, oneshot::Sender<CachedHttpResponse>),
    Post(ControlMessage),
    State(oneshot::Sender<WorkerState>),
    CacheNames(oneshot::Sender<Vec<String>>),
}

/// Handle to a spawned [`OfflineCacheWorker`]; cloneable, cheap.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    /// Route a request through the worker.
    ///
    /// Always yields a response-shaped value: strategy fallbacks, then a
    /// synthesized offline response — even if the worker task itself is
    /// gone.
    pub async fn fetch(&self, request: FetchRequest) -> CachedHttpResponse {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(WorkerCommand::Fetch(request, reply))
            .await
            .is_err()
        {
            return CachedHttpResponse::offline_json();
        }
        rx.await.unwrap_or_else(|_| CachedHttpResponse::offline_json())
    }

    /// Post a control message to the worker context.
    pub async fn post_message(&self, message: ControlMessage) -> Result<()> {
        self.tx
            .send(WorkerCommand::Post(message))
            .await
            .map_err(|_| MuninError::Invalid("worker is gone".to_string()))
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> Result<WorkerState> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerCommand::State(reply))
            .await
            .map_err(|_| MuninError::Invalid("worker is gone".to_string()))?;
        rx.await
            .map_err(|_| MuninError::Invalid("worker is gone".to_string()))
    }

    /// Names of the cache generations currently held.
    pub async fn cache_names(&self) -> Result<Vec<String>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WorkerCommand::CacheNames(reply))
            .await
            .map_err(|_| MuninError::Invalid("worker is gone".to_string()))?;
        rx.await
            .map_err(|_| MuninError::Invalid("worker is gone".to_string()))
    }
}

/// The worker itself: owns the named caches, processes the event queue.
pub struct OfflineCacheWorker {
    config: WorkerConfig,
    fetcher: Arc<dyn NetworkFetcher>,
    caches: NamedCaches,
    state: WorkerState,
}

impl OfflineCacheWorker {
    /// Spawn the worker task and return its handle.
    ///
    /// Install runs before the first command is accepted: the critical
    /// routes are pre-populated into the static cache, then the worker
    /// transitions to waiting (and on through activation when
    /// `auto_activate` is set).
    pub fn spawn(config: WorkerConfig, fetcher: Arc<dyn NetworkFetcher>) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(64);
        let worker = Self {
            caches: NamedCaches::new(config.version),
            config,
            fetcher,
            state: WorkerState::Installing,
        };
        tokio::spawn(worker.run(rx));
        WorkerHandle { tx }
    }

    /// Spawn with pre-seeded caches; test support for upgrade scenarios.
    #[doc(hidden)]
    pub fn spawn_with_caches(
        config: WorkerConfig,
        fetcher: Arc<dyn NetworkFetcher>,
        caches: NamedCaches,
    ) -> WorkerHandle {
        let (tx, rx) = mpsc::channel(64);
        let worker = Self {
            config,
            fetcher,
            caches,
            state: WorkerState::Installing,
        };
        tokio::spawn(worker.run(rx));
        WorkerHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<WorkerCommand>) {
        self.install().await;

        while let Some(command) = rx.recv().await {
            match command {
                WorkerCommand::Fetch(request, reply) => {
                    let response = self.handle_fetch(&request).await;
                    let _ = reply.send(response);
                }
                WorkerCommand::Post(message) => {
                    self.apply(WorkerEvent::Message(message)).await;
                }
                WorkerCommand::State(reply) => {
                    let _ = reply.send(self.state);
                }
                WorkerCommand::CacheNames(reply) => {
                    let _ = reply.send(self.caches.names());
                }
            }
        }
    }

    async fn install(&mut self) {
        debug!(version = self.config.version, "worker installing");
        self.perform(CacheAction::PrecacheStatic).await;
        self.apply(WorkerEvent::InstallComplete).await;
        if self.config.auto_activate {
            self.apply(WorkerEvent::Activate).await;
        }
    }

    /// Feed one event through the transition function and perform the
    /// returned side effects. An activation started by the event is
    /// driven to completion here.
    async fn apply(&mut self, event: WorkerEvent) {
        let (next, actions) = transition(self.state, &event);
        self.state = next;
        for action in actions {
            self.perform(action).await;
        }
        if self.state == WorkerState::Activating {
            let (next, actions) = transition(self.state, &WorkerEvent::ActivateComplete);
            self.state = next;
            for action in actions {
                self.perform(action).await;
            }
            debug!(version = self.config.version, "worker activated");
        }
    }

    async fn perform(&mut self, action: CacheAction) {
        match action {
            CacheAction::PrecacheStatic => {
                let routes = self.config.precache_routes.clone();
                self.precache(CacheKind::Static, &routes).await;
            }
            CacheAction::DeleteStaleGenerations => {
                let deleted = self.caches.delete_stale_generations();
                if !deleted.is_empty() {
                    debug!(?deleted, "removed stale cache generations");
                }
            }
            CacheAction::PrecacheRuntime(urls) => {
                self.precache(CacheKind::Runtime, &urls).await;
            }
            CacheAction::DeleteAllCaches => {
                self.caches.delete_all();
                debug!("all named caches deleted");
            }
        }
    }

    /// Fetch each URL and store successful responses. Failures are
    /// logged and skipped — a partially populated cache is still useful.
    async fn precache(&mut self, kind: CacheKind, urls: &[String]) {
        for path in urls {
            let url = if path.starts_with('/') {
                format!("{}{path}", self.config.origin)
            } else {
                path.clone()
            };
            let request = FetchRequest::new(url.clone());
            match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    self.caches.store(kind, url, response);
                }
                Ok(response) => {
                    warn!(url, status = response.status, "precache skipped non-success response");
                }
                Err(e) => {
                    warn!(url, error = %e, "precache fetch failed");
                }
            }
        }
    }

    async fn handle_fetch(&mut self, request: &FetchRequest) -> CachedHttpResponse {
        match classify(request, &self.config.origin, &self.config.api_prefix) {
            Strategy::Passthrough => match self.fetcher.fetch(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %request.url, error = %e, "passthrough fetch failed");
                    CachedHttpResponse::offline_json()
                }
            },
            Strategy::CacheFirst(kind) => self.cache_first(kind, request).await,
            Strategy::NetworkFirst(kind) => self.network_first(kind, request).await,
        }
    }

    async fn cache_first(&mut self, kind: CacheKind, request: &FetchRequest) -> CachedHttpResponse {
        if let Some(cached) = self.caches.lookup(kind, &request.url) {
            debug!(url = %request.url, "cache hit");
            return cached.clone();
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.caches.store(kind, request.url.clone(), response.clone());
                }
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "cache-first fetch failed with empty cache");
                CachedHttpResponse::offline_plain()
            }
        }
    }

    async fn network_first(&mut self, kind: CacheKind, request: &FetchRequest) -> CachedHttpResponse {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.caches.store(kind, request.url.clone(), response.clone());
                }
                response
            }
            Err(e) => {
                debug!(url = %request.url, error = %e, "network failed, trying cache");
                if let Some(cached) = self.caches.lookup(kind, &request.url) {
                    return cached.clone();
                }
                // Precached routes live in the static cache; check it for
                // the exact URL before giving up.
                if kind != CacheKind::Static {
                    if let Some(cached) = self.caches.lookup(CacheKind::Static, &request.url) {
                        return cached.clone();
                    }
                }
                // HTML documents get the dedicated offline page from the
                // static cache when the exact URL has never been cached.
                if request
                    .accept
                    .as_deref()
                    .is_some_and(|a| a.contains("text/html"))
                {
                    let offline_url =
                        format!("{}{}", self.config.origin, self.config.offline_page);
                    if let Some(page) = self.caches.lookup(CacheKind::Static, &offline_url) {
                        return page.clone();
                    }
                }
                CachedHttpResponse::offline_json()
            }
        }
    }
}
