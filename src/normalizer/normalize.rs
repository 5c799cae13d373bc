//! Best-effort mapping of backend payloads onto canonical records.
//!
//! Nothing here fails: unknown shapes become empty results.

use super::fields::{first_match, FieldTable, ResponseShape, DETAIL_FIELDS, STREAM_SOURCES, STREAM_URL};
use super::models::{StreamDescriptor, VideoDetail, VideoSummary};
use crate::resolver::Payload;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Search results in payload order; items without an id are dropped
pub fn normalize_summaries(payload: &Payload) -> Vec<VideoSummary> {
    let Some(value) = payload.as_structured() else {
        debug!("search payload is not structured data, no results");
        return Vec::new();
    };

    for shape in ResponseShape::ALL {
        if let Some(items) = shape.items(value) {
            let fields = shape.fields();
            let summaries: Vec<_> = items
                .iter()
                .filter_map(|item| summary_from(item, fields))
                .collect();
            debug!(
                "{:?}: kept {} of {} items",
                shape,
                summaries.len(),
                items.len()
            );
            return summaries;
        }
    }

    debug!("unrecognised search payload shape");
    Vec::new()
}

/// Stream candidates and metadata for `requested_id`.
///
/// The payload's own id wins when present; otherwise the requested one is
/// kept so the record always names the video it was resolved for.
pub fn normalize_detail(payload: &Payload, requested_id: &str) -> VideoDetail {
    let Some(value) = payload.as_structured().filter(|v| v.is_object()) else {
        return VideoDetail {
            id: requested_id.to_string(),
            stream_candidates: Vec::new(),
            summary: None,
        };
    };

    let id = first_match(value, DETAIL_FIELDS.id).unwrap_or_else(|| requested_id.to_string());
    let summary = VideoSummary {
        id: id.clone(),
        title: first_match(value, DETAIL_FIELDS.title).unwrap_or_default(),
        author: first_match(value, DETAIL_FIELDS.author).unwrap_or_default(),
        thumbnail_url: first_match(value, DETAIL_FIELDS.thumbnail),
    };
    let has_metadata = !summary.title.is_empty()
        || !summary.author.is_empty()
        || summary.thumbnail_url.is_some();

    VideoDetail {
        id,
        stream_candidates: stream_candidates(value),
        summary: has_metadata.then_some(summary),
    }
}

fn summary_from(item: &Value, fields: &FieldTable) -> Option<VideoSummary> {
    let id = first_match(item, fields.id)?;
    Some(VideoSummary {
        id,
        title: first_match(item, fields.title).unwrap_or_default(),
        author: first_match(item, fields.author).unwrap_or_default(),
        thumbnail_url: first_match(item, fields.thumbnail),
    })
}

fn stream_candidates(detail: &Value) -> Vec<StreamDescriptor> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for source in &STREAM_SOURCES {
        let Some(entries) = detail.get(source.field).and_then(Value::as_array) else {
            continue;
        };
        for entry in entries {
            let Some(url) = first_match(entry, STREAM_URL) else {
                continue;
            };
            if seen.insert(url.clone()) {
                candidates.push(StreamDescriptor {
                    media_kind: source.kind.classify(entry),
                    url,
                });
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::models::MediaKind;
    use serde_json::json;

    fn structured(value: Value) -> Payload {
        Payload::Structured(value)
    }

    #[test]
    fn test_plain_array_with_mixed_id_fields() {
        let payload = structured(json!([
            {"videoId": "a1", "title": "First", "author": "Ann", "thumbnail": "https://img/a1.jpg"},
            {"id": "b2", "name": "Second", "authorName": "Bob"},
            {"video": {"videoId": "c3", "title": "Third", "author": "Cy",
                       "thumbnails": [{"url": "https://img/c3.jpg"}]}},
            {"title": "no id here"},
            {"id": null, "videoId": ""}
        ]));

        let results = normalize_summaries(&payload);
        assert_eq!(results.len(), 3);

        assert_eq!(results[0].id, "a1");
        assert_eq!(results[0].thumbnail_url.as_deref(), Some("https://img/a1.jpg"));
        assert_eq!(results[1].title, "Second");
        assert_eq!(results[1].author, "Bob");
        assert_eq!(results[2].id, "c3");
        assert_eq!(results[2].title, "Third");
        assert_eq!(results[2].thumbnail_url.as_deref(), Some("https://img/c3.jpg"));
    }

    #[test]
    fn test_numeric_ids_are_kept() {
        let payload = structured(json!([
            {"id": 12345, "title": "numeric"},
            {"videoId": "abc"},
            {"id": {"nested": true}},
            {"id": []}
        ]));

        let results = normalize_summaries(&payload);
        let ids: Vec<_> = results.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["12345", "abc"]);
        assert_eq!(results[0].title, "numeric");
    }

    #[test]
    fn test_videos_field_with_nested_author() {
        let payload = structured(json!({
            "videos": [
                {"videoId": "v1", "title": "One", "author": {"name": "Chan"}, "thumbnail": "t1"},
                {"id": "v2", "title": "Two", "author": "Plain"}
            ]
        }));

        let results = normalize_summaries(&payload);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].author, "Chan");
        assert_eq!(results[1].author, "Plain");
        assert_eq!(results[1].thumbnail_url, None);
    }

    #[test]
    fn test_items_field_with_snippet_and_watch_urls() {
        let payload = structured(json!({
            "items": [
                {"id": {"videoId": "yt1"}, "snippet": {"title": "Snip", "channelTitle": "C",
                    "thumbnails": {"default": {"url": "https://img/yt1.jpg"}}}},
                {"url": "/watch?v=pp2", "title": "Piped", "uploaderName": "U", "thumbnail": "t"},
                {"url": "/channel/UCxyz", "name": "A channel"}
            ]
        }));

        let results = normalize_summaries(&payload);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "yt1");
        assert_eq!(results[0].title, "Snip");
        assert_eq!(results[0].author, "C");
        assert_eq!(results[0].thumbnail_url.as_deref(), Some("https://img/yt1.jpg"));
        assert_eq!(results[1].id, "pp2");
        assert_eq!(results[1].author, "U");
    }

    #[test]
    fn test_unknown_shapes_are_empty() {
        assert!(normalize_summaries(&structured(json!({"results": [{"id": "x"}]}))).is_empty());
        assert!(normalize_summaries(&structured(json!("just a string"))).is_empty());
        assert!(normalize_summaries(&structured(Value::Null)).is_empty());
        assert!(normalize_summaries(&Payload::Text("<html></html>".into())).is_empty());
    }

    #[test]
    fn test_detail_streams_in_order() {
        let payload = structured(json!({
            "title": "Talk",
            "uploader": "Speaker",
            "thumbnailUrl": "https://img/talk.jpg",
            "audioStreams": [{"url": "https://cdn/a.m4a", "mimeType": "audio/mp4"}],
            "videoStreams": [
                {"url": "https://cdn/v720.mp4"},
                {"urlWithSignature": "https://cdn/v480.mp4"},
                {"quality": "no url"}
            ]
        }));

        let detail = normalize_detail(&payload, "talk1");
        assert_eq!(detail.id, "talk1");
        let urls: Vec<_> = detail
            .stream_candidates
            .iter()
            .map(|s| (s.media_kind, s.url.as_str()))
            .collect();
        assert_eq!(
            urls,
            vec![
                (MediaKind::Video, "https://cdn/v720.mp4"),
                (MediaKind::Video, "https://cdn/v480.mp4"),
                (MediaKind::Audio, "https://cdn/a.m4a"),
            ]
        );

        let summary = detail.summary.unwrap();
        assert_eq!(summary.title, "Talk");
        assert_eq!(summary.author, "Speaker");
    }

    #[test]
    fn test_detail_generic_streams_classified_by_type() {
        let payload = structured(json!({
            "videoId": "inv1",
            "adaptiveFormats": [
                {"url": "https://cdn/audio.webm", "type": "audio/webm; codecs=\"opus\""},
                {"url": "https://cdn/video.webm", "type": "video/webm"}
            ],
            "streams": [{"url": "https://cdn/video.webm", "type": "video/webm"}]
        }));

        let detail = normalize_detail(&payload, "requested");
        assert_eq!(detail.id, "inv1");
        assert_eq!(detail.stream_candidates.len(), 2, "duplicate urls collapse");
        assert_eq!(detail.stream_candidates[0].url, "https://cdn/video.webm");
        assert_eq!(detail.stream_candidates[1].media_kind, MediaKind::Audio);
        assert!(detail.summary.is_none());
    }

    #[test]
    fn test_detail_from_unusable_payload() {
        for payload in [
            Payload::Text("<html>watch</html>".into()),
            structured(json!([1, 2, 3])),
            structured(json!({"error": "not found"})),
        ] {
            let detail = normalize_detail(&payload, "vid");
            assert_eq!(detail.id, "vid");
            assert!(detail.stream_candidates.is_empty());
        }
    }
}
