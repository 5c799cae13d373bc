use crate::cache::manifest::AssetManifest;
use crate::resolver::HttpResponse;
use crate::utils::error::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

/// One-way messages the foreground may post to the cache proxy.
///
/// Wire shape: `{ "type": "cache-url", "url": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ForegroundMessage {
    CacheUrl { url: String },
}

/// Commands handled by the cache proxy task
#[derive(Debug)]
pub enum CacheCommand {
    Install {
        manifest: AssetManifest,
        respond_to: oneshot::Sender<Result<String>>,
    },
    Activate {
        respond_to: oneshot::Sender<Result<String>>,
    },
    Fetch {
        url: Url,
        timeout: Duration,
        respond_to: oneshot::Sender<Result<ProxyResponse>>,
    },
    /// Advisory, never answered
    CacheUrl {
        url: String,
    },
    Status {
        respond_to: oneshot::Sender<Result<CacheStatus>>,
    },
    // System
    Shutdown,
}

impl From<ForegroundMessage> for CacheCommand {
    fn from(message: ForegroundMessage) -> Self {
        match message {
            ForegroundMessage::CacheUrl { url } => CacheCommand::CacheUrl { url },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    /// Network failed; the cached application shell was served instead
    OfflineShell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub response: HttpResponse,
    pub served_from: ServedFrom,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    pub active_generation: Option<String>,
    pub entry_count: u64,
}
