//! Canonical, backend-agnostic video records

use serde::{Deserialize, Serialize};

/// Search result shape handed to the UI layer. `id` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl VideoSummary {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            author: String::new(),
            thumbnail_url: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    pub media_kind: MediaKind,
    pub url: String,
}

/// Playback-relevant detail of one video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetail {
    pub id: String,
    /// In payload order, possibly empty
    #[serde(default)]
    pub stream_candidates: Vec<StreamDescriptor>,
    /// Title/author/thumbnail when the detail payload carries them
    #[serde(default)]
    pub summary: Option<VideoSummary>,
}

impl VideoDetail {
    /// First video stream, else first audio stream.
    ///
    /// Video streams carry their own audio; audio-only is the degraded path.
    pub fn preferred_stream(&self) -> Option<&StreamDescriptor> {
        self.stream_candidates
            .iter()
            .find(|s| s.media_kind == MediaKind::Video)
            .or_else(|| {
                self.stream_candidates
                    .iter()
                    .find(|s| s.media_kind == MediaKind::Audio)
            })
    }
}
