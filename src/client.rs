//! Foreground facade tying resolver, normalizer, playback chain and cache
//! proxy together

use crate::cache::{
    AssetManifest, CacheProxy, CacheProxyHandle, CacheStore, ProxiedTransport, ProxySettings,
};
use crate::database::{initialize_database, StateStore};
use crate::normalizer::{normalize_summaries, VideoSummary};
use crate::playback::{PlaybackChain, PlaybackOutcome, PlaybackSession, PlaybackSurface};
use crate::resolver::{CandidateRequest, EndpointResolver, HttpTransport, Transport};
use crate::utils::config::{ClientConfig, OperationConfig};
use crate::utils::error::{Result, VideoLiteError};
use reqwest::Url;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Direction through the saved playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Previous,
    Next,
}

/// Normalized search results and the backend target that produced them
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub source: Url,
    pub items: Vec<VideoSummary>,
}

pub struct VideoClient {
    config: ClientConfig,
    state: StateStore,
    resolver: Arc<EndpointResolver>,
    chain: PlaybackChain,
    cache: Option<CacheProxyHandle>,
    cache_task: Option<JoinHandle<()>>,
}

impl VideoClient {
    /// Builds a client over an explicit transport and state store
    pub fn new(
        config: ClientConfig,
        state: StateStore,
        transport: Arc<dyn Transport>,
        surface: Arc<dyn PlaybackSurface>,
        cache: Option<CacheProxyHandle>,
    ) -> Self {
        let resolver = Arc::new(EndpointResolver::new(transport));
        let mut chain = PlaybackChain::new(Arc::clone(&resolver), surface)
            .with_state_store(state.clone());
        if let Some(handle) = &cache {
            chain = chain.with_cache_hints(handle.clone());
        }

        Self {
            config,
            state,
            resolver,
            chain,
            cache,
            cache_task: None,
        }
    }

    /// Opens the database and wires the network stack.
    ///
    /// With `use_cache`, a cache proxy is spawned and every request goes
    /// through it; otherwise requests hit the network directly.
    pub async fn open(
        config: ClientConfig,
        surface: Arc<dyn PlaybackSurface>,
        use_cache: bool,
    ) -> Result<Self> {
        let pool = initialize_database(&config.database_path).await?;
        let network: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            &config.user_agent,
            config.attempt_timeout(),
        )?);

        if !use_cache {
            return Ok(Self::new(config, StateStore::new(pool.clone()), network, surface, None));
        }

        let settings = ProxySettings {
            max_entry_bytes: config.max_entry_bytes,
            fetch_timeout: config.attempt_timeout(),
        };
        let (handle, task) = CacheProxy::spawn(CacheStore::new(pool.clone()), network, settings);
        let transport = Arc::new(ProxiedTransport::new(handle.clone()));

        let mut client = Self::new(config, StateStore::new(pool), transport, surface, Some(handle));
        client.cache_task = Some(task);
        Ok(client)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn cache(&self) -> Option<&CacheProxyHandle> {
        self.cache.as_ref()
    }

    /// Settings snapshot for one operation; the backend address is re-read
    /// every time
    pub async fn operation_config(&self) -> Result<OperationConfig> {
        self.state.operation_config(&self.config).await
    }

    pub async fn search(&self, query: &str) -> Result<SearchResults> {
        let config = self.operation_config().await?;
        let request = CandidateRequest::search(&config.instance_base, query)?;
        let resolved = self.resolver.resolve(&request, config.attempt_timeout).await?;

        let items = normalize_summaries(&resolved.payload);
        info!("search {:?}: {} results from {}", query, items.len(), resolved.source);
        if let Some(cache) = &self.cache {
            cache.cache_url(resolved.source.as_str());
        }

        Ok(SearchResults {
            source: resolved.source,
            items,
        })
    }

    /// Runs the fallback chain for `video_id`.
    ///
    /// A selection that cannot reach any surface is reported as
    /// `UnplayableVideo`.
    pub async fn play(&self, video_id: &str, summary: Option<VideoSummary>) -> Result<PlaybackSession> {
        let config = self.operation_config().await?;
        let session = self.chain.select(&config, video_id, summary).await?;

        if session.outcome() == Some(&PlaybackOutcome::Unplayable) {
            return Err(VideoLiteError::UnplayableVideo(video_id.to_string()));
        }
        Ok(session)
    }

    /// Plays the playlist entry before or after the last-played video.
    ///
    /// Returns `None` when nothing was played yet, the last-played video is
    /// not saved, or it has no neighbour in that direction.
    pub async fn play_neighbour(&self, step: Step) -> Result<Option<PlaybackSession>> {
        let Some(last) = self.state.last_played().await? else {
            return Ok(None);
        };
        let (previous, next) = self.state.playlist_neighbours(&last.id).await?;
        let entry = match step {
            Step::Previous => previous,
            Step::Next => next,
        };

        let Some(entry) = entry else {
            info!("no {:?} playlist entry after {}", step, last.id);
            return Ok(None);
        };
        let video_id = entry.summary.id.clone();
        self.play(&video_id, Some(entry.summary)).await.map(Some)
    }

    /// Replays the last-played video with its recorded metadata
    pub async fn resume(&self) -> Result<Option<PlaybackSession>> {
        match self.state.last_played().await? {
            Some(last) => self.play(&last.id, last.summary).await.map(Some),
            None => Ok(None),
        }
    }

    /// Saves the last-played video to the playlist.
    ///
    /// Returns the stored summary and whether it was newly added, or `None`
    /// when nothing was played yet.
    pub async fn save_current(&self) -> Result<Option<(VideoSummary, bool)>> {
        let Some(last) = self.state.last_played().await? else {
            return Ok(None);
        };
        // Keyed by the selected id so neighbour lookups find it again
        let summary = match last.summary {
            Some(summary) => VideoSummary {
                id: last.id,
                ..summary
            },
            None => VideoSummary::new(last.id),
        };

        let added = self.state.add_to_playlist(&summary).await?;
        Ok(Some((summary, added)))
    }

    /// Installs and activates the configured asset manifest
    pub async fn install_assets(&self) -> Result<String> {
        let cache = self.cache.as_ref().ok_or(VideoLiteError::ProxyUnavailable)?;
        let manifest =
            AssetManifest::with_default_assets(&self.config.app_origin, &self.config.asset_revision)?;

        cache.install(manifest).await?;
        cache.activate().await
    }

    /// Stops the cache proxy, letting in-flight requests finish
    pub async fn shutdown(mut self) {
        if let Some(cache) = &self.cache {
            cache.shutdown().await;
        }
        if let Some(task) = self.cache_task.take() {
            if let Err(e) = task.await {
                warn!("cache proxy task ended abnormally: {}", e);
            }
        }
    }
}
