//! Field alias tables for the backend dialects we understand.
//!
//! Every logical attribute owns an ordered list of probes; the first probe
//! that yields a present value (non-empty string or number) wins. Supporting
//! a new dialect means adding a table row, not a code path.

use super::models::MediaKind;
use reqwest::Url;
use serde_json::Value;

/// One step into a JSON document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Key(&'static str),
    Index(usize),
}

/// Post-processing applied to the string a probe found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    AsIs,
    /// `/watch?v=ID` → `ID`
    WatchParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub path: &'static [Segment],
    pub transform: Transform,
}

impl Probe {
    pub fn extract(&self, item: &Value) -> Option<String> {
        let mut current = item;
        for segment in self.path {
            current = match segment {
                Segment::Key(key) => current.get(*key)?,
                Segment::Index(index) => current.get(*index)?,
            };
        }

        let raw = scalar_text(current)?;
        match self.transform {
            Transform::AsIs => Some(raw),
            Transform::WatchParam => watch_param(&raw),
        }
    }
}

/// Strings (trimmed, non-empty) and numbers count as present values
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First present value among `probes`, in priority order
pub fn first_match(item: &Value, probes: &[Probe]) -> Option<String> {
    probes.iter().find_map(|probe| probe.extract(item))
}

fn watch_param(raw: &str) -> Option<String> {
    let base = Url::parse("http://localhost/").ok()?;
    let url = base.join(raw).ok()?;
    if !url.path().ends_with("/watch") {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

macro_rules! probe {
    ($($segment:expr),+) => {
        Probe { path: &[$($segment),+], transform: Transform::AsIs }
    };
}

macro_rules! watch_probe {
    ($($segment:expr),+) => {
        Probe { path: &[$($segment),+], transform: Transform::WatchParam }
    };
}

use Segment::{Index as I, Key as K};

/// Alias lists for each logical summary attribute
#[derive(Debug)]
pub struct FieldTable {
    pub id: &'static [Probe],
    pub title: &'static [Probe],
    pub author: &'static [Probe],
    pub thumbnail: &'static [Probe],
}

/// Top-level payload dialects, probed in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[ {...}, ... ]`
    ItemArray,
    /// `{ "videos": [ ... ] }`
    VideosField,
    /// `{ "items": [ ... ] }`
    ItemsField,
}

impl ResponseShape {
    pub const ALL: [ResponseShape; 3] = [
        ResponseShape::ItemArray,
        ResponseShape::VideosField,
        ResponseShape::ItemsField,
    ];

    /// The item list this shape would read, if the payload has it
    pub fn items<'a>(&self, payload: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            ResponseShape::ItemArray => payload.as_array(),
            ResponseShape::VideosField => payload.get("videos")?.as_array(),
            ResponseShape::ItemsField => payload.get("items")?.as_array(),
        }
    }

    pub fn fields(&self) -> &'static FieldTable {
        match self {
            ResponseShape::ItemArray => &ITEM_ARRAY_FIELDS,
            ResponseShape::VideosField => &VIDEOS_FIELD_FIELDS,
            ResponseShape::ItemsField => &ITEMS_FIELD_FIELDS,
        }
    }
}

static ITEM_ARRAY_FIELDS: FieldTable = FieldTable {
    id: &[
        probe!(K("videoId")),
        probe!(K("id")),
        probe!(K("video"), K("videoId")),
    ],
    title: &[
        probe!(K("title")),
        probe!(K("name")),
        probe!(K("video"), K("title")),
    ],
    author: &[
        probe!(K("author")),
        probe!(K("authorName")),
        probe!(K("author"), K("name")),
        probe!(K("video"), K("author")),
    ],
    thumbnail: &[
        probe!(K("thumbnail")),
        probe!(K("thumbnail"), K("url")),
        probe!(K("video"), K("thumbnails"), I(0), K("url")),
        probe!(K("videoThumbnails"), I(0), K("url")),
        probe!(K("thumb")),
    ],
};

static VIDEOS_FIELD_FIELDS: FieldTable = FieldTable {
    id: &[probe!(K("videoId")), probe!(K("id"))],
    title: &[probe!(K("title"))],
    author: &[probe!(K("author"), K("name")), probe!(K("author"))],
    thumbnail: &[probe!(K("thumbnail"))],
};

static ITEMS_FIELD_FIELDS: FieldTable = FieldTable {
    id: &[
        probe!(K("id")),
        probe!(K("videoId")),
        probe!(K("id"), K("videoId")),
        watch_probe!(K("url")),
    ],
    title: &[probe!(K("title")), probe!(K("snippet"), K("title"))],
    author: &[
        probe!(K("author")),
        probe!(K("uploaderName")),
        probe!(K("snippet"), K("channelTitle")),
    ],
    thumbnail: &[
        probe!(K("thumbnail")),
        probe!(K("snippet"), K("thumbnails"), K("default"), K("url")),
    ],
};

/// Summary attributes found at the top level of a detail payload
pub static DETAIL_FIELDS: FieldTable = FieldTable {
    id: &[probe!(K("id")), probe!(K("videoId"))],
    title: &[probe!(K("title"))],
    author: &[
        probe!(K("uploader")),
        probe!(K("author")),
        probe!(K("author"), K("name")),
    ],
    thumbnail: &[
        probe!(K("thumbnailUrl")),
        probe!(K("thumbnail")),
        probe!(K("videoThumbnails"), I(0), K("url")),
    ],
};

/// How a stream list decides the kind of its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindRule {
    Fixed(MediaKind),
    /// Read `type`/`mimeType`; anything not `audio/*` counts as video
    ByMimeType,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamSource {
    pub field: &'static str,
    pub kind: KindRule,
}

/// Stream lists in the order their entries become candidates
pub static STREAM_SOURCES: [StreamSource; 7] = [
    StreamSource { field: "videoStreams", kind: KindRule::Fixed(MediaKind::Video) },
    StreamSource { field: "video_streams", kind: KindRule::Fixed(MediaKind::Video) },
    StreamSource { field: "formatStreams", kind: KindRule::Fixed(MediaKind::Video) },
    StreamSource { field: "streams", kind: KindRule::ByMimeType },
    StreamSource { field: "adaptiveFormats", kind: KindRule::ByMimeType },
    StreamSource { field: "audioStreams", kind: KindRule::Fixed(MediaKind::Audio) },
    StreamSource { field: "audio_streams", kind: KindRule::Fixed(MediaKind::Audio) },
];

pub static STREAM_URL: &[Probe] = &[probe!(K("url")), probe!(K("urlWithSignature"))];

pub static STREAM_MIME: &[Probe] = &[probe!(K("type")), probe!(K("mimeType"))];

impl KindRule {
    pub fn classify(&self, entry: &Value) -> MediaKind {
        match self {
            KindRule::Fixed(kind) => *kind,
            KindRule::ByMimeType => match first_match(entry, STREAM_MIME) {
                Some(mime) if mime.to_ascii_lowercase().starts_with("audio") => MediaKind::Audio,
                _ => MediaKind::Video,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_probe_walks_nested_paths() {
        let item = json!({"video": {"thumbnails": [{"url": "https://img/0.jpg"}]}});
        let probe = probe!(K("video"), K("thumbnails"), I(0), K("url"));
        assert_eq!(probe.extract(&item).as_deref(), Some("https://img/0.jpg"));
    }

    #[test]
    fn test_probe_skips_null_empty_and_non_strings() {
        let probes = &[probe!(K("a")), probe!(K("b")), probe!(K("c")), probe!(K("d"))];
        let item = json!({"a": null, "b": "  ", "c": {"nested": true}, "d": "winner"});
        assert_eq!(first_match(&item, probes).as_deref(), Some("winner"));
        assert_eq!(first_match(&json!({}), probes), None);
    }

    #[test]
    fn test_numbers_count_as_present() {
        let probes = &[probe!(K("a")), probe!(K("b")), probe!(K("c"))];
        let item = json!({"a": [1], "b": false, "c": 12345});
        assert_eq!(first_match(&item, probes).as_deref(), Some("12345"));
        assert_eq!(
            probe!(K("n")).extract(&json!({"n": 1.5})).as_deref(),
            Some("1.5")
        );
    }

    #[test]
    fn test_watch_param_transform() {
        let probe = watch_probe!(K("url"));
        assert_eq!(
            probe.extract(&json!({"url": "/watch?v=abc123"})).as_deref(),
            Some("abc123")
        );
        assert_eq!(
            probe
                .extract(&json!({"url": "https://piped.example/watch?list=x&v=zz"}))
                .as_deref(),
            Some("zz")
        );
        assert_eq!(probe.extract(&json!({"url": "/channel/UC123"})), None);
        assert_eq!(probe.extract(&json!({"url": "/watch"})), None);
    }

    #[test]
    fn test_shape_item_lists() {
        let array = json!([{"id": "a"}]);
        let videos = json!({"videos": [{"id": "a"}]});
        let items = json!({"items": []});

        assert!(ResponseShape::ItemArray.items(&array).is_some());
        assert!(ResponseShape::ItemArray.items(&videos).is_none());
        assert_eq!(ResponseShape::VideosField.items(&videos).unwrap().len(), 1);
        assert!(ResponseShape::VideosField.items(&json!({"videos": null})).is_none());
        assert!(ResponseShape::ItemsField.items(&items).is_some());
    }

    #[test]
    fn test_mime_classification() {
        let rule = KindRule::ByMimeType;
        assert_eq!(rule.classify(&json!({"type": "audio/webm"})), MediaKind::Audio);
        assert_eq!(rule.classify(&json!({"mimeType": "AUDIO/mp4"})), MediaKind::Audio);
        assert_eq!(rule.classify(&json!({"type": "video/mp4"})), MediaKind::Video);
        assert_eq!(rule.classify(&json!({})), MediaKind::Video);
    }
}
