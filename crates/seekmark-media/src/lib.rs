// crates/seekmark-media/src/lib.rs
//
// No front-end dependency: communicates with seekmark-cli via channels only.
//
// Layering, leaf to root:
//   stream    : open container + decoder (ffmpeg or synthetic)
//   session   : the currently open video
//   engine    : frame-accurate seeking over the lazy keyframe index
//   coalescer : collapses queued navigation into the latest intent
//   worker    : seek thread + the API the front end calls

pub mod cancel;
pub mod coalescer;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod session;
pub mod snapshot;
pub mod stream;
pub mod worker;

// Re-export the main public API so front-end imports are simple.
pub use engine::{SeekConfig, SeekEngine, SeekOutcome, SeekStatus};
pub use error::MediaError;
pub use stream::synthetic::{SyntheticOpener, SyntheticSpec};
pub use stream::{StreamOpener, VideoStream};
pub use worker::{ActiveVideo, MediaWorker};
pub use seekmark_core::media_types::MediaResult;

#[cfg(feature = "ffmpeg")]
pub use stream::ffmpeg_backend::FfmpegOpener;
