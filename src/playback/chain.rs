//! Playback fallback chain.
//!
//! `select` drives a selection from `ResolvingDetail` to the first strategy
//! the surface is handed (direct stream, embedded page, or nothing at all).
//! Everything after that is reported from the outside through the returned
//! `PlaybackSession`: the surface starting or stalling, or the user asking
//! for the external page.

use super::guard::{SelectionGuard, SelectionToken};
use super::outcome::{ChainStage, PlaybackOutcome};
use super::surface::PlaybackSurface;
use crate::cache::CacheProxyHandle;
use crate::database::{LastPlayed, StateStore};
use crate::normalizer::{normalize_detail, StreamDescriptor, VideoDetail, VideoSummary};
use crate::resolver::{watch_page, CandidateRequest, EndpointResolver};
use crate::utils::config::OperationConfig;
use crate::utils::error::{Result, VideoLiteError};
use chrono::Utc;
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct PlaybackChain {
    resolver: Arc<EndpointResolver>,
    surface: Arc<dyn PlaybackSurface>,
    guard: SelectionGuard,
    state: Option<StateStore>,
    cache: Option<CacheProxyHandle>,
    // Serializes last-played writes so a superseded selection cannot land
    // after a newer one
    record_lock: AsyncMutex<()>,
}

impl PlaybackChain {
    pub fn new(resolver: Arc<EndpointResolver>, surface: Arc<dyn PlaybackSurface>) -> Self {
        Self {
            resolver,
            surface,
            guard: SelectionGuard::new(),
            state: None,
            cache: None,
            record_lock: AsyncMutex::new(()),
        }
    }

    /// Record last-played selections in `state`
    pub fn with_state_store(mut self, state: StateStore) -> Self {
        self.state = Some(state);
        self
    }

    /// Send advisory cache hints for resolved detail responses
    pub fn with_cache_hints(mut self, cache: CacheProxyHandle) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Starts a new selection, superseding any selection still in progress.
    ///
    /// Fails with `SelectionSuperseded` if a newer selection started while
    /// the detail was being resolved. An `Unplayable` outcome is returned as
    /// a terminal session, not as an error.
    pub async fn select(
        &self,
        config: &OperationConfig,
        video_id: &str,
        summary: Option<VideoSummary>,
    ) -> Result<PlaybackSession> {
        let token = self.guard.begin(video_id);
        let session_id = Uuid::new_v4();
        let span = info_span!("playback", session = %session_id, video = %video_id);

        self.run_selection(config, video_id, summary, token, session_id)
            .instrument(span)
            .await
    }

    async fn run_selection(
        &self,
        config: &OperationConfig,
        video_id: &str,
        summary: Option<VideoSummary>,
        token: SelectionToken,
        session_id: Uuid,
    ) -> Result<PlaybackSession> {
        let video_id = video_id.trim();
        let mut session = PlaybackSession {
            session_id,
            video_id: video_id.to_string(),
            stage: ChainStage::ResolvingDetail,
            history: vec![ChainStage::ResolvingDetail],
            outcome: None,
            selected_stream: None,
            watch_url: watch_page(&config.instance_base, video_id).map(String::from),
            token,
            surface: Arc::clone(&self.surface),
        };

        let detail = self.resolve_detail(config, video_id).await;
        session.ensure_current()?;

        if let (Some((source, _)), Some(cache)) = (&detail, &self.cache) {
            cache.cache_url(source.as_str());
        }
        let detail = detail.map(|(_, detail)| detail);

        match detail.as_ref().and_then(VideoDetail::preferred_stream) {
            Some(stream) => session.enter_direct(stream.clone())?,
            None => match session.watch_url.clone() {
                Some(url) => session.enter_embedded(url)?,
                None => {
                    warn!("no stream and no watch page for {}", video_id);
                    session.finish(PlaybackOutcome::Unplayable);
                    return Ok(session);
                }
            },
        }

        let summary = summary.or_else(|| detail.and_then(|d| d.summary));
        self.record_last_played(&session, summary).await;
        Ok(session)
    }

    async fn resolve_detail(
        &self,
        config: &OperationConfig,
        video_id: &str,
    ) -> Option<(Url, VideoDetail)> {
        let request = match CandidateRequest::video_detail(&config.instance_base, video_id) {
            Ok(request) => request,
            Err(e) => {
                warn!("cannot build detail request: {}", e);
                return None;
            }
        };

        match self.resolver.resolve(&request, config.attempt_timeout).await {
            Ok(resolved) => {
                let detail = normalize_detail(&resolved.payload, video_id);
                info!(
                    "detail for {} has {} stream candidates",
                    detail.id,
                    detail.stream_candidates.len()
                );
                Some((resolved.source, detail))
            }
            Err(e) => {
                warn!("detail resolution failed: {}", e);
                None
            }
        }
    }

    async fn record_last_played(&self, session: &PlaybackSession, summary: Option<VideoSummary>) {
        let Some(state) = &self.state else {
            return;
        };
        let _recording = self.record_lock.lock().await;
        if !session.token.is_current() {
            debug!("selection for {} superseded, not recording", session.video_id);
            return;
        }

        let record = LastPlayed {
            id: session.video_id.clone(),
            summary,
            stream_url: session.selected_stream.as_ref().map(|s| s.url.clone()),
            timestamp: Utc::now(),
        };
        if let Err(e) = state.save_last_played(&record).await {
            error!("failed to record last played {}: {}", record.id, e);
        }
    }
}

/// One selection's progress through the chain
pub struct PlaybackSession {
    session_id: Uuid,
    video_id: String,
    stage: ChainStage,
    history: Vec<ChainStage>,
    outcome: Option<PlaybackOutcome>,
    selected_stream: Option<StreamDescriptor>,
    watch_url: Option<String>,
    token: SelectionToken,
    surface: Arc<dyn PlaybackSurface>,
}

impl PlaybackSession {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn stage(&self) -> ChainStage {
        self.stage
    }

    /// Every stage entered so far, in order
    pub fn history(&self) -> &[ChainStage] {
        &self.history
    }

    /// What the surface currently shows. `None` while a direct stream is
    /// loading but has not reported playback yet.
    pub fn outcome(&self) -> Option<&PlaybackOutcome> {
        self.outcome.as_ref()
    }

    pub fn selected_stream(&self) -> Option<&StreamDescriptor> {
        self.selected_stream.as_ref()
    }

    pub fn watch_url(&self) -> Option<&str> {
        self.watch_url.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.stage == ChainStage::Terminal
    }

    /// The surface started playing the direct stream
    pub fn playback_started(&mut self) -> Result<()> {
        self.ensure_current()?;
        if self.stage != ChainStage::AttemptingDirect {
            return Err(self.invalid("confirm playback"));
        }

        let url = self
            .selected_stream
            .as_ref()
            .map(|s| s.url.clone())
            .unwrap_or_default();
        self.finish(PlaybackOutcome::DirectStream(url));
        Ok(())
    }

    /// The surface stalled or errored on the direct stream, possibly long
    /// after playback had started. Falls back to the embedded page.
    pub fn playback_failed(&mut self) -> Result<()> {
        self.ensure_current()?;
        let direct_active = self.stage == ChainStage::AttemptingDirect
            || matches!(self.outcome, Some(PlaybackOutcome::DirectStream(_)));
        if !direct_active {
            return Err(self.invalid("report a stream failure"));
        }

        warn!(session = %self.session_id, "direct stream for {} failed", self.video_id);
        match self.watch_url.clone() {
            Some(url) => self.enter_embedded(url),
            None => {
                self.finish(PlaybackOutcome::Unplayable);
                Ok(())
            }
        }
    }

    /// User-triggered escape to the external watch page
    pub fn open_external(&mut self) -> Result<()> {
        self.ensure_current()?;
        if self.is_terminal() {
            return Err(self.invalid("open the external page"));
        }
        let url = self
            .watch_url
            .clone()
            .ok_or_else(|| VideoLiteError::UnplayableVideo(self.video_id.clone()))?;

        self.enter(ChainStage::AttemptingExternal);
        self.on_surface(|surface| surface.open_external(&url))?;
        self.finish(PlaybackOutcome::ExternalPage(url));
        Ok(())
    }

    fn enter_direct(&mut self, stream: StreamDescriptor) -> Result<()> {
        self.enter(ChainStage::AttemptingDirect);
        self.on_surface(|surface| surface.load_stream(&stream))?;
        info!(session = %self.session_id, "loading {:?} stream {}", stream.media_kind, stream.url);
        self.selected_stream = Some(stream);
        Ok(())
    }

    fn enter_embedded(&mut self, url: String) -> Result<()> {
        self.enter(ChainStage::AttemptingEmbedded);
        self.on_surface(|surface| surface.show_embedded(&url))?;
        self.outcome = Some(PlaybackOutcome::EmbeddedPage(url));
        Ok(())
    }

    fn finish(&mut self, outcome: PlaybackOutcome) {
        self.enter(ChainStage::Terminal);
        info!(session = %self.session_id, "playback of {} settled: {:?}", self.video_id, outcome);
        self.outcome = Some(outcome);
    }

    fn enter(&mut self, stage: ChainStage) {
        info!(session = %self.session_id, "{} -> {}", self.stage, stage);
        self.stage = stage;
        self.history.push(stage);
    }

    fn on_surface(&self, action: impl FnOnce(&dyn PlaybackSurface)) -> Result<()> {
        self.token
            .run_if_current(|| action(self.surface.as_ref()))
            .ok_or_else(|| VideoLiteError::SelectionSuperseded(self.video_id.clone()))
    }

    fn ensure_current(&self) -> Result<()> {
        if self.token.is_current() {
            Ok(())
        } else {
            Err(VideoLiteError::SelectionSuperseded(self.video_id.clone()))
        }
    }

    fn invalid(&self, action: &'static str) -> VideoLiteError {
        VideoLiteError::InvalidTransition {
            from: self.stage.to_string(),
            action,
        }
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("session_id", &self.session_id)
            .field("video_id", &self.video_id)
            .field("stage", &self.stage)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
