//! Playback fallback chain: direct stream, embedded page, external page

pub mod chain;
pub mod guard;
pub mod outcome;
pub mod surface;

pub use chain::{PlaybackChain, PlaybackSession};
pub use guard::{SelectionGuard, SelectionToken};
pub use outcome::{ChainStage, PlaybackOutcome};
pub use surface::{PlaybackSurface, RecordingSurface, SurfaceCall};
