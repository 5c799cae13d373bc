pub mod fields;
pub mod models;
pub mod normalize;

pub use fields::ResponseShape;
pub use models::{MediaKind, StreamDescriptor, VideoDetail, VideoSummary};
pub use normalize::{normalize_detail, normalize_summaries};
