use super::actor::CacheProxyHandle;
use super::messages::ServedFrom;
use crate::resolver::{HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::debug;

/// Routes every GET through the cache proxy.
///
/// The offline shell only stands in for page loads; to a backend candidate
/// it is reported as the network failure it replaces.
#[derive(Debug, Clone)]
pub struct ProxiedTransport {
    proxy: CacheProxyHandle,
}

impl ProxiedTransport {
    pub fn new(proxy: CacheProxyHandle) -> Self {
        Self { proxy }
    }
}

#[async_trait]
impl Transport for ProxiedTransport {
    fn id(&self) -> &'static str {
        "cache-proxy"
    }

    async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let served = self
            .proxy
            .fetch(url, timeout)
            .await
            .map_err(|e| TransportError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        match served.served_from {
            ServedFrom::OfflineShell => Err(TransportError::Unreachable {
                url: url.to_string(),
                reason: "offline".to_string(),
            }),
            ServedFrom::Cache => {
                debug!("{} served from cache", url);
                Ok(served.response)
            }
            ServedFrom::Network => Ok(served.response),
        }
    }
}
