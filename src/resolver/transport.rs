//! HTTP transport seam shared by the resolver and the cache proxy

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure to obtain any response at all
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("could not reach {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("failed to read body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Declared content category of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    /// JSON documents
    Structured,
    /// HTML, XML and other text
    Markup,
    /// Audio/video payloads and playlists pointing at them
    Media,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        let Some(raw) = content_type else {
            return ContentKind::Other;
        };
        let mime = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime.starts_with("video/")
            || mime.starts_with("audio/")
            || mime == "application/octet-stream"
            || mime.contains("mpegurl")
            || mime == "application/dash+xml"
        {
            ContentKind::Media
        } else if mime == "application/json" || mime.ends_with("+json") {
            ContentKind::Structured
        } else if mime.starts_with("text/") || mime.ends_with("xml") {
            ContentKind::Markup
        } else {
            ContentKind::Other
        }
    }
}

/// A fully buffered HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_kind(&self) -> ContentKind {
        ContentKind::from_content_type(self.content_type.as_deref())
    }
}

/// Anything able to perform a GET request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns a short identifier for logging (e.g., "http", "cache-proxy")
    fn id(&self) -> &'static str;

    /// Performs a GET, giving up after `timeout`
    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// Direct network transport backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, default_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(default_timeout)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn id(&self) -> &'static str {
        "http"
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, TransportError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = response.url().to_string();

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(url.to_string())
            } else {
                TransportError::Body {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        Ok(HttpResponse {
            url: final_url,
            status,
            content_type,
            body: body.to_vec(),
        })
    }
}

fn classify(url: &Url, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(url.to_string())
    } else {
        TransportError::Unreachable {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}
