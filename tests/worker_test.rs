//! End-to-end offline worker behaviour with a scripted network: lifecycle,
//! strategy routing, offline fallbacks, generation upgrades, and the
//! control message protocol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use munin::worker::{
    cache_name, CacheKind, CachedHttpResponse, ControlMessage, FetchRequest, NamedCaches,
    NetworkFetcher, OfflineCacheWorker, WorkerConfig, WorkerState,
};
use munin::{MuninError, Result};

const ORIGIN: &str = "https://app.example.com";

/// Scripted network: serves registered URLs while "online", fails every
/// request while "offline".
struct ScriptedNetwork {
    online: AtomicBool,
    responses: Mutex<HashMap<String, CachedHttpResponse>>,
}

impl ScriptedNetwork {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            online: AtomicBool::new(true),
            responses: Mutex::new(HashMap::new()),
        })
    }

    fn serve(&self, url: &str, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            CachedHttpResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: body.as_bytes().to_vec(),
            },
        );
    }

    fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkFetcher for ScriptedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<CachedHttpResponse> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(MuninError::Http("network unreachable".into()));
        }
        let responses = self.responses.lock().unwrap();
        Ok(responses
            .get(&request.url)
            .cloned()
            .unwrap_or(CachedHttpResponse {
                status: 404,
                headers: vec![],
                body: b"not found".to_vec(),
            }))
    }
}

fn config(routes: &[&str]) -> WorkerConfig {
    WorkerConfig::new(ORIGIN).precache_routes(routes.iter().map(|r| r.to_string()).collect())
}

fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

#[tokio::test]
async fn worker_installs_and_auto_activates() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/"), "home");

    let worker = OfflineCacheWorker::spawn(config(&["/"]), network);
    assert_eq!(worker.state().await.unwrap(), WorkerState::Activated);
}

#[tokio::test]
async fn worker_waits_without_auto_activation_until_skip_waiting() {
    let network = ScriptedNetwork::new();
    let worker = OfflineCacheWorker::spawn(config(&[]).auto_activate(false), network);

    assert_eq!(worker.state().await.unwrap(), WorkerState::Waiting);

    worker.post_message(ControlMessage::SkipWaiting).await.unwrap();
    assert_eq!(worker.state().await.unwrap(), WorkerState::Activated);
}

#[tokio::test]
async fn precached_routes_replay_offline() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/dashboard"), "<html>dash</html>");

    let worker = OfflineCacheWorker::spawn(config(&["/dashboard"]), network.clone());
    worker.state().await.unwrap(); // install finished
    network.go_offline();

    let response = worker
        .fetch(FetchRequest::new(url("/dashboard")).accept("text/html"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html>dash</html>");
}

#[tokio::test]
async fn cache_first_assets_replay_byte_identical_offline() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/main.js"), "console.log('hi')");

    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    let online = worker.fetch(FetchRequest::new(url("/main.js"))).await;
    assert_eq!(online.status, 200);

    network.go_offline();
    let offline = worker.fetch(FetchRequest::new(url("/main.js"))).await;
    assert_eq!(offline, online);
}

#[tokio::test]
async fn network_first_api_falls_back_to_last_good_response() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/api/notes"), r#"[{"id":1}]"#);

    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    let fresh = worker.fetch(FetchRequest::new(url("/api/notes"))).await;
    assert_eq!(fresh.status, 200);

    network.go_offline();
    let stale = worker.fetch(FetchRequest::new(url("/api/notes"))).await;
    assert_eq!(stale.body, fresh.body);
}

#[tokio::test]
async fn uncached_api_requests_synthesize_offline_json() {
    let network = ScriptedNetwork::new();
    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    worker.state().await.unwrap();
    network.go_offline();

    let response = worker.fetch(FetchRequest::new(url("/api/never-seen"))).await;
    assert_eq!(response.status, 503);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Offline");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn html_requests_fall_back_to_the_offline_page() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/offline.html"), "<html>offline</html>");

    let worker = OfflineCacheWorker::spawn(config(&["/offline.html"]), network.clone());
    worker.state().await.unwrap();
    network.go_offline();

    let response = worker
        .fetch(FetchRequest::new(url("/never-visited")).accept("text/html"))
        .await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"<html>offline</html>");
}

#[tokio::test]
async fn version_bump_garbage_collects_old_generations() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/"), "v2 home");

    let mut caches = NamedCaches::new(2);
    caches.seed_generation(
        &cache_name(CacheKind::Static, 1),
        url("/"),
        CachedHttpResponse {
            status: 200,
            headers: vec![],
            body: b"v1 home".to_vec(),
        },
    );

    let worker = OfflineCacheWorker::spawn_with_caches(
        config(&["/"]).version(2),
        network,
        caches,
    );
    worker.state().await.unwrap();

    let names = worker.cache_names().await.unwrap();
    assert!(names.contains(&cache_name(CacheKind::Static, 2)));
    assert!(!names.contains(&cache_name(CacheKind::Static, 1)));
}

#[tokio::test]
async fn cache_urls_message_populates_the_runtime_cache() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/viewer"), "viewer shell");

    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    worker
        .post_message(ControlMessage::CacheUrls {
            urls: vec![url("/viewer")],
        })
        .await
        .unwrap();

    network.go_offline();
    let response = worker.fetch(FetchRequest::new(url("/viewer"))).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"viewer shell");
}

#[tokio::test]
async fn clear_cache_message_drops_everything() {
    let network = ScriptedNetwork::new();
    network.serve(&url("/main.js"), "asset");

    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    worker.fetch(FetchRequest::new(url("/main.js"))).await;

    worker.post_message(ControlMessage::ClearCache).await.unwrap();
    network.go_offline();

    let response = worker.fetch(FetchRequest::new(url("/main.js"))).await;
    assert_eq!(response.status, 503);
}

#[tokio::test]
async fn cross_origin_requests_are_never_cached() {
    let network = ScriptedNetwork::new();
    network.serve("https://cdn.other.com/lib.js", "lib");

    let worker = OfflineCacheWorker::spawn(config(&[]), network.clone());
    let online = worker
        .fetch(FetchRequest::new("https://cdn.other.com/lib.js"))
        .await;
    assert_eq!(online.status, 200);

    network.go_offline();
    let offline = worker
        .fetch(FetchRequest::new("https://cdn.other.com/lib.js"))
        .await;
    assert_eq!(offline.status, 503);
}
