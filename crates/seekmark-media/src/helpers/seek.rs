// crates/seekmark-media/src/helpers/seek.rs
//
// Container seeks with consistent soft-fail behaviour.
//
// A failed seek is not fatal to a navigation request: the demuxer keeps
// decoding from wherever it currently is, and the seek engine's frame-number
// checks decide whether the position is still usable. All seeks route through
// here so the warning is logged in one place; whether a failure is a hard
// error stays a decision of the call site.

use tracing::warn;

use crate::stream::VideoStream;

/// Seek `stream` to `timestamp` (TIME_BASE units, backward to a keyframe).
///
/// Returns `false` when the container refused the seek. Always logs on
/// failure so seek issues are visible without aborting the request.
pub fn reseek(stream: &mut dyn VideoStream, timestamp: i64, label: &str) -> bool {
    match stream.seek_to(timestamp) {
        Ok(()) => true,
        Err(e) => {
            warn!(timestamp, "seek soft-fail in {label}: {e}; decoding from current position");
            false
        }
    }
}

/// Whether a container seek to `timestamp` has to be issued at all.
///
/// A demuxer that has not read a packet since opening already sits at 0, and
/// `avformat_seek_file` to 0 on such a context fails with EPERM on Windows.
pub fn seek_required(timestamp: i64, untouched: bool) -> bool {
    timestamp > 0 || !untouched
}

/// Backward seek of an ffmpeg input to the keyframe at or before `timestamp`.
///
/// Uses the `..=ts` range so the demuxer never lands past the target when the
/// container honours the request; callers still verify the landing frame.
#[cfg(feature = "ffmpeg")]
pub fn seek_input(
    ictx:      &mut ffmpeg_the_third::format::context::Input,
    timestamp: i64,
) -> Result<(), crate::error::MediaError> {
    ictx.seek(timestamp, ..=timestamp)
        .map_err(|e| crate::error::MediaError::Seek(format!("at {timestamp}: {e}")))
}
