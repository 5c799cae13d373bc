//! VideoLite library

pub mod cache;
pub mod client;
pub mod database;
pub mod normalizer;
pub mod playback;
pub mod resolver;
pub mod utils;

// Re-export main types for easier use
pub use cache::{AssetManifest, CacheProxy, CacheProxyHandle, ServedFrom};
pub use client::{SearchResults, Step, VideoClient};
pub use normalizer::{StreamDescriptor, VideoDetail, VideoSummary};
pub use playback::{ChainStage, PlaybackChain, PlaybackOutcome, PlaybackSession};
pub use resolver::{CandidateRequest, EndpointResolver, Transport};
pub use utils::{ClientConfig, VideoLiteError};
