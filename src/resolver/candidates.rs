//! Candidate request templates for each logical backend operation

use crate::utils::error::{Result, VideoLiteError};
use reqwest::Url;

const MAX_IDENTIFIER_LEN: usize = 128;

/// Logical operation a candidate list performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Search,
    VideoDetail,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Search => "search",
            Operation::VideoDetail => "video-detail",
        }
    }
}

/// Ordered, equivalent GET targets for one logical operation.
///
/// Earlier targets are preferred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRequest {
    operation: Operation,
    targets: Vec<Url>,
}

impl CandidateRequest {
    pub fn new(operation: Operation, targets: Vec<Url>) -> Self {
        Self { operation, targets }
    }

    /// `{base}/api/v1/search?q=`, `{base}/search?q=`, `{base}/api/v1/search?query=`
    pub fn search(base: &str, query: &str) -> Result<Self> {
        let base = normalize_base(base)?;
        let targets = vec![
            with_query(&base, "/api/v1/search", "q", query)?,
            with_query(&base, "/search", "q", query)?,
            with_query(&base, "/api/v1/search", "query", query)?,
        ];
        Ok(Self::new(Operation::Search, targets))
    }

    /// `{base}/api/v1/videos/{id}`, `{base}/api/v1/video?id=`, `{base}/api/v1/videos?videoId=`
    pub fn video_detail(base: &str, video_id: &str) -> Result<Self> {
        let video_id = validate_identifier(video_id)?;
        let base = normalize_base(base)?;
        let targets = vec![
            with_segment(&base, "/api/v1/videos", video_id)?,
            with_query(&base, "/api/v1/video", "id", video_id)?,
            with_query(&base, "/api/v1/videos", "videoId", video_id)?,
        ];
        Ok(Self::new(Operation::VideoDetail, targets))
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn targets(&self) -> &[Url] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Canonical `{base}/watch?v={id}` page, if both parts are usable
pub fn watch_page(base: &str, video_id: &str) -> Option<Url> {
    let video_id = validate_identifier(video_id).ok()?;
    let base = normalize_base(base).ok()?;
    with_query(&base, "/watch", "v", video_id).ok()
}

/// Rejects identifiers that cannot name a video on any backend
pub fn validate_identifier(video_id: &str) -> Result<&str> {
    let trimmed = video_id.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= MAX_IDENTIFIER_LEN
        && !trimmed
            .chars()
            .any(|c| c.is_whitespace() || c.is_control());

    if valid {
        Ok(trimmed)
    } else {
        Err(VideoLiteError::InvalidUrl(format!(
            "invalid video identifier {:?}",
            video_id
        )))
    }
}

fn normalize_base(base: &str) -> Result<String> {
    let trimmed = base.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|e| VideoLiteError::InvalidUrl(format!("{}: {}", base, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
        return Err(VideoLiteError::InvalidUrl(format!(
            "backend address must be http(s): {}",
            base
        )));
    }
    Ok(trimmed.to_string())
}

fn parse_at(base: &str, path: &str) -> Result<Url> {
    let raw = format!("{}{}", base, path);
    Url::parse(&raw).map_err(|e| VideoLiteError::InvalidUrl(format!("{}: {}", raw, e)))
}

fn with_query(base: &str, path: &str, key: &str, value: &str) -> Result<Url> {
    let mut url = parse_at(base, path)?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url)
}

fn with_segment(base: &str, path: &str, segment: &str) -> Result<Url> {
    let mut url = parse_at(base, path)?;
    url.path_segments_mut()
        .map_err(|_| VideoLiteError::InvalidUrl(format!("{}{}", base, path)))?
        .push(segment);
    Ok(url)
}
