//! Trace recording and offline replay.

pub mod trace;
pub mod player;
pub mod recorder;

pub use player::{DeltaOrigin, Playback, TimedDelta, TracePlayer};
pub use recorder::{record, RecordOptions};
pub use trace::{Trace, TraceMetadata, CURRENT_FORMAT_VERSION};
