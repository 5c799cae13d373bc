//! Error handling for videolite

use thiserror::Error;

/// Main error type for videolite
#[derive(Debug, Error)]
pub enum VideoLiteError {
    #[error("All {attempted} endpoint candidates failed (last error: {last_error})")]
    AllCandidatesFailed {
        attempted: usize,
        urls: Vec<String>,
        last_error: String,
    },

    #[error("Video {0} cannot be played: no stream and no watch page could be constructed")]
    UnplayableVideo(String),

    #[error("Selection for video {0} was superseded by a newer selection")]
    SelectionSuperseded(String),

    #[error("Cannot {action} while playback is {from}")]
    InvalidTransition { from: String, action: &'static str },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Cache installation failed: {0}")]
    CacheInstall(String),

    #[error("Network unavailable and no cached application shell for {0}")]
    Offline(String),

    #[error("Cache proxy is not running")]
    ProxyUnavailable,

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T, E = VideoLiteError> = std::result::Result<T, E>;
