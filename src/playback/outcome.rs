use serde::{Deserialize, Serialize};
use std::fmt;

/// What the playback surface ends up showing for one selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "kebab-case")]
pub enum PlaybackOutcome {
    DirectStream(String),
    EmbeddedPage(String),
    ExternalPage(String),
    Unplayable,
}

impl PlaybackOutcome {
    pub fn url(&self) -> Option<&str> {
        match self {
            PlaybackOutcome::DirectStream(url)
            | PlaybackOutcome::EmbeddedPage(url)
            | PlaybackOutcome::ExternalPage(url) => Some(url),
            PlaybackOutcome::Unplayable => None,
        }
    }
}

/// States of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStage {
    ResolvingDetail,
    AttemptingDirect,
    AttemptingEmbedded,
    AttemptingExternal,
    Terminal,
}

impl ChainStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStage::ResolvingDetail => "resolving-detail",
            ChainStage::AttemptingDirect => "attempting-direct",
            ChainStage::AttemptingEmbedded => "attempting-embedded",
            ChainStage::AttemptingExternal => "attempting-external",
            ChainStage::Terminal => "terminal",
        }
    }
}

impl fmt::Display for ChainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
