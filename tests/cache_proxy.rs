//! Cache proxy lifecycle: install, activate, intercept and advisory caching

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use videolite::cache::{
    AssetManifest, CacheProxy, CacheProxyHandle, CacheStore, ProxiedTransport, ProxySettings,
};
use videolite::database::initialize_database;
use videolite::resolver::{
    CandidateRequest, EndpointResolver, HttpResponse, Transport, TransportError,
};
use videolite::{ServedFrom, VideoLiteError};

const TIMEOUT: Duration = Duration::from_secs(1);

/// In-memory network with per-URL call counting
#[derive(Default)]
struct StubNetwork {
    routes: Mutex<HashMap<String, (String, Vec<u8>)>>,
    calls: Mutex<Vec<String>>,
}

impl StubNetwork {
    fn serve(&self, url: &str, content_type: &str, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            (content_type.to_string(), body.as_bytes().to_vec()),
        );
    }

    fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Transport for StubNetwork {
    fn id(&self) -> &'static str {
        "stub"
    }

    async fn get(&self, url: &Url, _timeout: Duration) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(url.to_string());
        let routes = self.routes.lock().unwrap();
        let (content_type, body) =
            routes
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| TransportError::Unreachable {
                    url: url.to_string(),
                    reason: "no route".into(),
                })?;
        Ok(HttpResponse {
            url: url.to_string(),
            status: 200,
            content_type: Some(content_type),
            body,
        })
    }
}

async fn start(network: Arc<StubNetwork>) -> (CacheProxyHandle, TempDir) {
    let dir = TempDir::new().unwrap();
    let pool = initialize_database(&dir.path().join("cache.db")).await.unwrap();
    let (handle, _task) = CacheProxy::spawn(
        CacheStore::new(pool),
        network,
        ProxySettings {
            max_entry_bytes: 1024,
            fetch_timeout: TIMEOUT,
        },
    );
    (handle, dir)
}

fn manifest(revision: &str) -> AssetManifest {
    AssetManifest::new(
        "http://app.local",
        revision,
        vec!["/index.html".into(), "/css/styles.css".into()],
    )
    .unwrap()
}

fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}

/// Waits until the proxy's active index holds `count` entries
async fn wait_for_entries(handle: &CacheProxyHandle, count: u64) {
    for _ in 0..100 {
        if handle.status().await.unwrap().entry_count >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cache never reached {count} entries");
}

#[tokio::test]
async fn installed_assets_are_served_without_network() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html>v1</html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    let (handle, _dir) = start(network.clone()).await;

    handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();

    let served = handle
        .fetch(&url("http://app.local/index.html"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(served.served_from, ServedFrom::Cache);
    assert_eq!(served.response.body, b"<html>v1</html>");
    assert_eq!(network.calls_to("http://app.local/index.html"), 1);
}

#[tokio::test]
async fn new_generation_retires_the_previous_one() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html>v1</html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    network.serve("https://api.example/trending", "application/json", "[1]");
    let (handle, _dir) = start(network.clone()).await;

    let first = handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();
    handle
        .fetch(&url("https://api.example/trending"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(handle.status().await.unwrap().entry_count, 3);

    network.serve("http://app.local/index.html", "text/html", "<html>v2</html>");
    let second = handle.install(manifest("v2")).await.unwrap();
    assert_ne!(first, second);

    // Still the old index until activation
    let before = handle
        .fetch(&url("http://app.local/index.html"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(before.response.body, b"<html>v1</html>");

    assert_eq!(handle.activate().await.unwrap(), second);
    let status = handle.status().await.unwrap();
    assert_eq!(status.active_generation.as_deref(), Some(second.as_str()));
    assert_eq!(status.entry_count, 2);

    let after = handle
        .fetch(&url("http://app.local/index.html"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(after.response.body, b"<html>v2</html>");

    let trending = handle
        .fetch(&url("https://api.example/trending"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(trending.served_from, ServedFrom::Network);
}

#[tokio::test]
async fn successful_hint_is_served_from_cache() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html></html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    network.serve("https://api.example/api/v1/videos/abc", "application/json", "{}");
    let (handle, _dir) = start(network.clone()).await;
    handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();

    handle.cache_url("https://api.example/api/v1/videos/abc");
    wait_for_entries(&handle, 3).await;

    let served = handle
        .fetch(&url("https://api.example/api/v1/videos/abc"), TIMEOUT)
        .await
        .unwrap();
    assert_eq!(served.served_from, ServedFrom::Cache);
    assert_eq!(network.calls_to("https://api.example/api/v1/videos/abc"), 1);
}

#[tokio::test]
async fn failed_hint_falls_through_to_network() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html></html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    let (handle, _dir) = start(network.clone()).await;
    handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();

    let target = "https://api.example/api/v1/videos/later";
    handle.cache_url(target);
    for _ in 0..100 {
        if network.calls_to(target) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(network.calls_to(target), 1);
    assert_eq!(handle.status().await.unwrap().entry_count, 2);

    network.serve(target, "application/json", r#"{"id":"later"}"#);
    let served = handle.fetch(&url(target), TIMEOUT).await.unwrap();
    assert_eq!(served.served_from, ServedFrom::Network);
    assert_eq!(served.response.body, br#"{"id":"later"}"#);
}

#[tokio::test]
async fn media_is_never_cached() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html></html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    network.serve("https://cdn.example/stream.mp4", "video/mp4", "frames");
    let (handle, _dir) = start(network.clone()).await;
    handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();

    handle.cache_url("https://cdn.example/stream.mp4");
    for _ in 0..2 {
        let served = handle
            .fetch(&url("https://cdn.example/stream.mp4"), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(served.served_from, ServedFrom::Network);
    }
    assert_eq!(handle.status().await.unwrap().entry_count, 2);
}

#[tokio::test]
async fn offline_shell_is_a_failure_to_the_resolver() {
    let network = Arc::new(StubNetwork::default());
    network.serve("http://app.local/index.html", "text/html", "<html>shell</html>");
    network.serve("http://app.local/css/styles.css", "text/css", "body{}");
    let (handle, _dir) = start(network.clone()).await;
    handle.install(manifest("v1")).await.unwrap();
    handle.activate().await.unwrap();

    // Every backend candidate is unreachable, so the proxy answers with the shell
    let request = CandidateRequest::search("https://api.example", "q").unwrap();
    let first = request.targets()[0].clone();
    let served = handle.fetch(&first, TIMEOUT).await.unwrap();
    assert_eq!(served.served_from, ServedFrom::OfflineShell);

    let resolver = EndpointResolver::new(Arc::new(ProxiedTransport::new(handle.clone())));
    let err = resolver.resolve(&request, TIMEOUT).await.unwrap_err();

    match err {
        VideoLiteError::AllCandidatesFailed { attempted, urls, .. } => {
            assert_eq!(attempted, request.len());
            assert_eq!(urls.len(), request.len());
        }
        other => panic!("expected every candidate to fail, got {other:?}"),
    }
    for target in request.targets() {
        assert!(network.calls_to(target.as_str()) >= 1);
    }
}
