// crates/seekmark-media/src/stream/mod.rs
//
// Stream handle abstraction: one open container + video decoder.
//
// The seek engine only needs two primitives, a lossy container seek and a
// sequential "decode the next picture", plus conversion of the most recent
// picture to RGBA. Conversion is split from decoding so that the many frames
// burned through on the way to a target are never scaled.
//
// Backends:
//   ffmpeg_backend : real files through ffmpeg (cargo feature `ffmpeg`)
//   synthetic      : deterministic in-memory stream for tests and dry runs

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_backend;
pub mod synthetic;

use std::path::Path;

use seekmark_core::media_types::FrameImage;

use crate::error::MediaError;

/// Properties known right after `open`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StreamInfo {
    pub frame_count: u64,
    pub fps:         f64,
}

/// One decoded picture, identified by its presentation-derived number.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub keyframe: bool,
    /// 1-indexed frame number derived from the PTS.
    pub number:   u64,
}

pub trait VideoStream: Send {
    fn info(&self) -> StreamInfo;

    /// Container-level seek to the keyframe at or before `timestamp`
    /// (TIME_BASE units). The landing frame is unknown until the next
    /// `demux_next`. Resets decoder state.
    fn seek_to(&mut self, timestamp: i64) -> Result<(), MediaError>;

    /// Decode the next picture. `Ok(None)` once the stream is exhausted.
    fn demux_next(&mut self) -> Result<Option<DecodedFrame>, MediaError>;

    /// RGBA copy of the picture most recently returned by `demux_next`.
    fn current_image(&mut self) -> Result<FrameImage, MediaError>;

    /// Release native resources. Calling it twice is a no-op.
    fn close(&mut self);
}

/// Opens stream handles; lets the worker stay backend-agnostic.
pub trait StreamOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, MediaError>;

    /// Whether `path` is worth trying to open when cycling through videos.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}
