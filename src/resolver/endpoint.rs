use crate::resolver::candidates::CandidateRequest;
use crate::resolver::transport::{ContentKind, HttpResponse, Transport};
use crate::utils::error::{Result, VideoLiteError};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Decoded body of the answering candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Structured(Value),
    Text(String),
}

impl Payload {
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Payload::Structured(value) => Some(value),
            Payload::Text(_) => None,
        }
    }
}

/// First successful answer of a candidate list
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResponse {
    /// The target that answered
    pub source: Url,
    pub payload: Payload,
}

/// Tries equivalent targets one after another until one answers.
///
/// Attempts never overlap and a target is never retried; a slow backend
/// that eventually answers within the attempt timeout wins over later ones.
pub struct EndpointResolver {
    transport: Arc<dyn Transport>,
}

impl EndpointResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn resolve(
        &self,
        candidates: &CandidateRequest,
        attempt_timeout: Duration,
    ) -> Result<ResolvedResponse> {
        let operation = candidates.operation().as_str();
        let mut attempted = Vec::with_capacity(candidates.len());
        let mut last_error = String::from("no candidates");

        for target in candidates.targets() {
            debug!("[{}] trying {} via {}", operation, target, self.transport.id());
            attempted.push(target.to_string());

            let outcome = tokio::time::timeout(
                attempt_timeout,
                self.transport.get(target, attempt_timeout),
            )
            .await;

            let response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!("[{}] {} failed: {}", operation, target, e);
                    last_error = e.to_string();
                    continue;
                }
                Err(_) => {
                    warn!(
                        "[{}] {} timed out after {:?}",
                        operation, target, attempt_timeout
                    );
                    last_error = format!("{} timed out", target);
                    continue;
                }
            };

            if !response.is_success() {
                warn!("[{}] {} answered {}", operation, target, response.status);
                last_error = format!("{} answered HTTP {}", target, response.status);
                continue;
            }

            match decode(&response) {
                Ok(payload) => {
                    info!("[{}] resolved via {}", operation, target);
                    return Ok(ResolvedResponse {
                        source: target.clone(),
                        payload,
                    });
                }
                Err(reason) => {
                    warn!("[{}] {} undecodable: {}", operation, target, reason);
                    last_error = format!("{}: {}", target, reason);
                }
            }
        }

        Err(VideoLiteError::AllCandidatesFailed {
            attempted: attempted.len(),
            urls: attempted,
            last_error,
        })
    }
}

fn decode(response: &HttpResponse) -> std::result::Result<Payload, String> {
    match response.content_kind() {
        ContentKind::Structured => serde_json::from_slice(&response.body)
            .map(Payload::Structured)
            .map_err(|e| format!("invalid JSON: {}", e)),
        _ => String::from_utf8(response.body.clone())
            .map(Payload::Text)
            .map_err(|e| format!("invalid UTF-8 text: {}", e)),
    }
}
