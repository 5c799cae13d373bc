use crate::normalizer::StreamDescriptor;
use std::sync::Mutex;

/// Whatever renders playback: a media element, an embedded page, a browser.
///
/// Calls are fire-and-forget; the surface reports playback start or stalls
/// back through the session, not through return values.
pub trait PlaybackSurface: Send + Sync {
    fn load_stream(&self, stream: &StreamDescriptor);
    fn show_embedded(&self, url: &str);
    fn open_external(&self, url: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    LoadStream(StreamDescriptor),
    ShowEmbedded(String),
    OpenExternal(String),
}

/// Headless surface that only remembers what it was asked to do
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<SurfaceCall> {
        self.lock().last().cloned()
    }

    fn record(&self, call: SurfaceCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SurfaceCall>> {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlaybackSurface for RecordingSurface {
    fn load_stream(&self, stream: &StreamDescriptor) {
        self.record(SurfaceCall::LoadStream(stream.clone()));
    }

    fn show_embedded(&self, url: &str) {
        self.record(SurfaceCall::ShowEmbedded(url.to_string()));
    }

    fn open_external(&self, url: &str) {
        self.record(SurfaceCall::OpenExternal(url.to_string()));
    }
}
