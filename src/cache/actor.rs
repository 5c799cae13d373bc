use super::manifest::AssetManifest;
use super::messages::{CacheCommand, CacheStatus, ProxyResponse, ServedFrom};
use super::store::{request_key, CacheStore};
use crate::resolver::{ContentKind, HttpResponse, Transport};
use crate::utils::error::{Result, VideoLiteError};
use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const COMMAND_BUFFER: usize = 64;

/// Tunables of the cache proxy
#[derive(Debug, Clone)]
pub struct ProxySettings {
    /// Responses larger than this are passed through but never stored
    pub max_entry_bytes: usize,
    /// Timeout for install and advisory fetches
    pub fetch_timeout: Duration,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            max_entry_bytes: 2 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Cloneable sender side of the cache proxy
#[derive(Debug, Clone)]
pub struct CacheProxyHandle {
    sender: mpsc::Sender<CacheCommand>,
}

impl CacheProxyHandle {
    /// Seeds a fresh generation from `manifest`; returns its id
    pub async fn install(&self, manifest: AssetManifest) -> Result<String> {
        self.request(|respond_to| CacheCommand::Install {
            manifest,
            respond_to,
        })
        .await
    }

    /// Activates the newest installed generation; returns its id
    pub async fn activate(&self) -> Result<String> {
        self.request(|respond_to| CacheCommand::Activate { respond_to })
            .await
    }

    /// Intercepted GET
    pub async fn fetch(&self, url: &Url, timeout: Duration) -> Result<ProxyResponse> {
        self.request(|respond_to| CacheCommand::Fetch {
            url: url.clone(),
            timeout,
            respond_to,
        })
        .await
    }

    pub async fn status(&self) -> Result<CacheStatus> {
        self.request(|respond_to| CacheCommand::Status { respond_to })
            .await
    }

    /// Asks the proxy to remember `url`. Best effort: never fails, never waits.
    pub fn cache_url(&self, url: &str) {
        if let Err(e) = self.sender.try_send(CacheCommand::CacheUrl {
            url: url.to_string(),
        }) {
            debug!("cache hint for {} dropped: {}", url, e);
        }
    }

    /// Stops the proxy after in-flight work has finished
    pub async fn shutdown(&self) {
        let _ = self.sender.send(CacheCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> CacheCommand,
    ) -> Result<T> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| VideoLiteError::ProxyUnavailable)?;
        response.await.map_err(|_| VideoLiteError::ProxyUnavailable)?
    }
}

/// Background process that owns the response cache.
///
/// Commands are handled on a single task. Lifecycle commands (install,
/// activate, status) run to completion before the next command is read;
/// fetches and advisory caching interleave cooperatively on the same task.
pub struct CacheProxy {
    receiver: mpsc::Receiver<CacheCommand>,
    core: Arc<ProxyCore>,
}

impl CacheProxy {
    pub fn new(
        store: CacheStore,
        transport: Arc<dyn Transport>,
        settings: ProxySettings,
    ) -> (Self, CacheProxyHandle) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let core = Arc::new(ProxyCore {
            store,
            transport,
            settings,
        });
        (Self { receiver, core }, CacheProxyHandle { sender })
    }

    /// Spawns the proxy on the current runtime
    pub fn spawn(
        store: CacheStore,
        transport: Arc<dyn Transport>,
        settings: ProxySettings,
    ) -> (CacheProxyHandle, JoinHandle<()>) {
        let (proxy, handle) = Self::new(store, transport, settings);
        let task = tokio::spawn(proxy.run());
        (handle, task)
    }

    pub async fn run(mut self) {
        info!("CacheProxy started");
        let mut in_flight: FuturesUnordered<BoxFuture<'static, ()>> = FuturesUnordered::new();

        loop {
            tokio::select! {
                command = self.receiver.recv() => {
                    let Some(command) = command else { break };
                    match command {
                        CacheCommand::Install { manifest, respond_to } => {
                            let _ = respond_to.send(self.core.install(&manifest).await);
                        }
                        CacheCommand::Activate { respond_to } => {
                            let _ = respond_to.send(self.core.activate().await);
                        }
                        CacheCommand::Status { respond_to } => {
                            let _ = respond_to.send(self.core.status().await);
                        }
                        CacheCommand::Fetch { url, timeout, respond_to } => {
                            let core = Arc::clone(&self.core);
                            in_flight.push(Box::pin(async move {
                                let _ = respond_to.send(core.intercept(&url, timeout).await);
                            }));
                        }
                        CacheCommand::CacheUrl { url } => {
                            let core = Arc::clone(&self.core);
                            in_flight.push(Box::pin(async move {
                                core.remember(&url).await;
                            }));
                        }
                        CacheCommand::Shutdown => {
                            info!("CacheProxy shutting down");
                            break;
                        }
                    }
                }
                Some(()) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }

        while in_flight.next().await.is_some() {}
    }
}

struct ProxyCore {
    store: CacheStore,
    transport: Arc<dyn Transport>,
    settings: ProxySettings,
}

impl ProxyCore {
    async fn install(&self, manifest: &AssetManifest) -> Result<String> {
        let generation = manifest.generation();
        if self.store.active_generation().await?.as_deref() == Some(generation.as_str()) {
            debug!("generation {} already active, nothing to install", generation);
            return Ok(generation);
        }

        let urls = manifest.asset_urls()?;
        info!(
            "Installing cache generation {} ({} assets)",
            generation,
            urls.len()
        );

        let timeout = self.settings.fetch_timeout;
        let fetched = join_all(urls.iter().map(|url| async move {
            match self.transport.get(url, timeout).await {
                Ok(response) if response.is_success() => Ok((request_key(url), response)),
                Ok(response) => Err(format!("{} answered HTTP {}", url, response.status)),
                Err(e) => Err(e.to_string()),
            }
        }))
        .await;

        let entries = fetched
            .into_iter()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|reason| {
                warn!("Install of generation {} aborted: {}", generation, reason);
                VideoLiteError::CacheInstall(reason)
            })?;

        let shell_key = manifest.shell_url().map(|url| request_key(&url));
        self.store
            .install_generation(&generation, shell_key.as_deref(), &entries)
            .await?;
        Ok(generation)
    }

    async fn activate(&self) -> Result<String> {
        let generation = self.store.newest_generation().await?.ok_or_else(|| {
            VideoLiteError::CacheInstall("no installed generation to activate".to_string())
        })?;
        self.store.activate(&generation).await?;
        Ok(generation)
    }

    async fn status(&self) -> Result<CacheStatus> {
        Ok(CacheStatus {
            active_generation: self.store.active_generation().await?,
            entry_count: self.store.entry_count().await?,
        })
    }

    /// Cache-first GET with opportunistic storing and an offline shell
    async fn intercept(&self, url: &Url, timeout: Duration) -> Result<ProxyResponse> {
        let key = request_key(url);

        match self.store.lookup(&key).await {
            Ok(Some(response)) => {
                debug!("cache hit {}", key);
                return Ok(ProxyResponse {
                    response,
                    served_from: ServedFrom::Cache,
                });
            }
            Ok(None) => {}
            Err(e) => error!("cache lookup for {} failed: {}", key, e),
        }

        match self.transport.get(url, timeout).await {
            Ok(response) => {
                if response.is_success() && self.is_opportunistic(&response) {
                    self.store_quietly(&key, &response).await;
                }
                Ok(ProxyResponse {
                    response,
                    served_from: ServedFrom::Network,
                })
            }
            Err(e) => {
                warn!("network failed for {}: {}", url, e);
                match self.store.lookup_shell().await {
                    Ok(Some(shell)) => Ok(ProxyResponse {
                        response: shell,
                        served_from: ServedFrom::OfflineShell,
                    }),
                    Ok(None) => Err(VideoLiteError::Offline(url.to_string())),
                    Err(db) => {
                        error!("shell lookup failed: {}", db);
                        Err(VideoLiteError::Offline(url.to_string()))
                    }
                }
            }
        }
    }

    /// Advisory caching: every failure is swallowed
    async fn remember(&self, raw: &str) {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                debug!("ignoring cache hint {:?}: {}", raw, e);
                return;
            }
        };

        let key = request_key(&url);
        if let Ok(Some(_)) = self.store.lookup(&key).await {
            debug!("cache hint {} already cached", url);
            return;
        }

        match self.transport.get(&url, self.settings.fetch_timeout).await {
            Ok(response) if response.is_success() && self.is_storable(&response) => {
                self.store_quietly(&key, &response).await;
            }
            Ok(response) => debug!(
                "cache hint {} not stored (HTTP {}, {:?})",
                url,
                response.status,
                response.content_kind()
            ),
            Err(e) => debug!("cache hint {} failed: {}", url, e),
        }
    }

    /// Metadata and markup picked up on the intercept path
    fn is_opportunistic(&self, response: &HttpResponse) -> bool {
        matches!(
            response.content_kind(),
            ContentKind::Structured | ContentKind::Markup
        ) && self.is_storable(response)
    }

    /// Media payloads are never stored, whatever path they arrive on
    fn is_storable(&self, response: &HttpResponse) -> bool {
        response.content_kind() != ContentKind::Media
            && response.body.len() <= self.settings.max_entry_bytes
    }

    async fn store_quietly(&self, key: &str, response: &HttpResponse) {
        if let Err(e) = self.store.store_active(key, response).await {
            error!("failed to store {}: {}", key, e);
        }
    }
}
